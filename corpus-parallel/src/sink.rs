//! File-backed sharded output
//!
//! Each shard owns one destination file behind its own mutex, so writers
//! targeting different shards never wait on each other. Records are encoded
//! before the lock is taken; the critical section only appends one complete
//! line to the shard's buffer.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use corpus_core::{Error, OutputFormat, Record, RecordSink, Result};
use corpus_readers::{create_record_writer, encode_record, RecordWriter};
use tracing::{debug, warn};

type ShardWriter = RecordWriter<BufWriter<File>>;

/// Destinations for `shards` outputs derived from `base`
///
/// A single shard writes to `base` itself; otherwise shard `i` writes to
/// `<base>.<i>`.
pub fn shard_paths(base: &Path, shards: usize) -> Vec<PathBuf> {
    if shards <= 1 {
        return vec![base.to_path_buf()];
    }

    (0..shards)
        .map(|i| {
            let mut name = OsString::from(base.as_os_str());
            name.push(format!(".{i}"));
            PathBuf::from(name)
        })
        .collect()
}

struct Shard {
    path: PathBuf,
    writer: Mutex<Option<ShardWriter>>,
    written: AtomicU64,
}

/// A [`RecordSink`] writing each shard to its own file
///
/// Every shard is finished exactly once: by [`RecordSink::close`], or when
/// the sink is dropped on an early exit. A shard whose write failed is
/// dropped from service and later writes to it report
/// [`Error::ShardClosed`].
pub struct ShardedSink {
    shards: Vec<Shard>,
    format: OutputFormat,
}

impl ShardedSink {
    /// Create (truncating) every shard file under `base`
    pub fn create(base: &Path, shards: usize, format: OutputFormat) -> Result<Self> {
        let paths = shard_paths(base, shards);

        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut opened = Vec::with_capacity(paths.len());
        for (index, path) in paths.into_iter().enumerate() {
            let writer =
                create_record_writer(&path, format).map_err(|err| sink_error(index, &path, err))?;
            opened.push(Shard {
                path,
                writer: Mutex::new(Some(writer)),
                written: AtomicU64::new(0),
            });
        }

        debug!(shards = opened.len(), ?format, "Opened output shards");
        Ok(Self {
            shards: opened,
            format,
        })
    }

    /// Destination of every shard, in shard order
    pub fn shard_paths(&self) -> Vec<PathBuf> {
        self.shards.iter().map(|s| s.path.clone()).collect()
    }

    /// Records written to each shard so far
    pub fn shard_counts(&self) -> Vec<u64> {
        self.shards
            .iter()
            .map(|s| s.written.load(Ordering::Relaxed))
            .collect()
    }

    /// Output format of every shard
    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl RecordSink for ShardedSink {
    fn write(&self, record: &Record, shard_hint: usize) -> Result<()> {
        let index = shard_hint % self.shards.len();
        let shard = &self.shards[index];
        let payload = encode_record(record, self.format)?;

        let mut guard = shard.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(Error::ShardClosed(index))?;

        if let Err(err) = writer.write_encoded(&payload) {
            retire(guard.take(), index);
            return Err(sink_error(index, &shard.path, err));
        }

        shard.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn close(&self) -> Result<()> {
        let mut first_error = None;

        for (index, shard) in self.shards.iter().enumerate() {
            let writer = shard
                .writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();

            let Some(writer) = writer else {
                continue;
            };

            if let Err(err) = writer.finish() {
                let err = sink_error(index, &shard.path, err);
                warn!(shard = index, error = %err, "Failed to close output shard");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ShardedSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Output shards closed with errors");
        }
    }
}

/// Finish a writer taken out of service so its document keeps a closing tail
fn retire<W: Write>(writer: Option<RecordWriter<W>>, shard: usize) {
    if let Some(Err(err)) = writer.map(RecordWriter::finish) {
        debug!(shard, error = %err, "Could not finish a failed shard");
    }
}

fn sink_error(shard: usize, path: &Path, err: corpus_readers::Error) -> Error {
    match err {
        corpus_readers::Error::Io(source) => Error::SinkWrite {
            shard,
            path: path.to_path_buf(),
            source,
        },
        other => other.into(),
    }
}
