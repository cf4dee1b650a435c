//! Input file discovery

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use corpus_core::PipelineConfig;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Finds the files a run will process
///
/// Every root is walked recursively and files whose name ends with one of the
/// suffixes (case-insensitive) are returned. A root that is itself a file is
/// returned as-is. The result is ordered by root, then by path within the
/// root, so repeated enumerations of an unchanged tree agree.
#[derive(Debug, Clone)]
pub struct SourceEnumerator {
    /// Directories or files to scan
    roots: Vec<PathBuf>,

    /// Lower-cased accepted suffixes
    suffixes: Vec<String>,

    /// Whether to follow symbolic links while walking
    follow_links: bool,
}

impl SourceEnumerator {
    /// Create an enumerator over `roots` accepting `suffixes`
    pub fn new<P, S>(
        roots: impl IntoIterator<Item = P>,
        suffixes: impl IntoIterator<Item = S>,
    ) -> Self
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
            suffixes: suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            follow_links: false,
        }
    }

    /// Create an enumerator from the inputs and suffixes of a run
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.inputs, config.normalized_suffixes())
    }

    /// Follow symbolic links while walking
    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Whether a file name carries an accepted suffix
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// List every matching file under the roots
    ///
    /// Fails with [`Error::PathNotFound`] before walking anything if a root
    /// does not exist. Finding no files is not an error.
    pub fn enumerate(&self) -> Result<Vec<PathBuf>> {
        if let Some(missing) = self.roots.iter().find(|root| !root.exists()) {
            return Err(Error::PathNotFound(missing.clone()));
        }

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for root in &self.roots {
            if root.is_file() {
                if seen.insert(root.clone()) {
                    files.push(root.clone());
                }
                continue;
            }

            let walker = WalkDir::new(root)
                .follow_links(self.follow_links)
                .sort_by_file_name();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                        continue;
                    }
                };

                if entry.file_type().is_file() && self.matches(entry.path()) {
                    let path = entry.into_path();
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
            }
        }

        debug!(roots = self.roots.len(), files = files.len(), "enumerated input files");
        Ok(files)
    }
}
