//! Content-quality stages: garbled-text and script-ratio detection
//!
//! Both detectors measure fractions of characters (Unicode scalar values) of
//! a record's content. Records without content are treated as empty, which
//! is never garbled and never majority-script.

use std::ops::RangeInclusive;

use corpus_core::{Record, RejectReason, Stage};

/// CJK Unified Ideographs
pub const CJK_IDEOGRAPHS: RangeInclusive<char> = '\u{4E00}'..='\u{9FFF}';

/// Full-width punctuation common in Chinese text
const CJK_PUNCTUATION: [char; 8] = ['。', '，', '“', '”', '！', '？', '；', '：'];

/// Whether a character belongs to the allowed set: ASCII, CJK ideographs,
/// common CJK punctuation, or whitespace
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii() || CJK_IDEOGRAPHS.contains(&c) || c.is_whitespace() || CJK_PUNCTUATION.contains(&c)
}

/// Fraction of characters outside the allowed set; `None` for empty text
#[allow(clippy::cast_precision_loss)]
pub fn disallowed_fraction(text: &str) -> Option<f64> {
    let (total, allowed) = text.chars().fold((0usize, 0usize), |(total, allowed), c| {
        (total + 1, allowed + usize::from(is_allowed_char(c)))
    });

    if total == 0 {
        None
    } else {
        Some(1.0 - allowed as f64 / total as f64)
    }
}

/// Fraction of characters inside any of `ranges`; `None` for empty text
#[allow(clippy::cast_precision_loss)]
pub fn script_fraction(text: &str, ranges: &[RangeInclusive<char>]) -> Option<f64> {
    let (total, matching) = text.chars().fold((0usize, 0usize), |(total, matching), c| {
        let hit = ranges.iter().any(|range| range.contains(&c));
        (total + 1, matching + usize::from(hit))
    });

    if total == 0 {
        None
    } else {
        Some(matching as f64 / total as f64)
    }
}

/// Rejects records whose disallowed-character fraction exceeds a threshold
#[derive(Debug, Clone)]
pub struct GarbledTextFilter {
    threshold: f64,
}

impl GarbledTextFilter {
    /// Create a filter rejecting above `threshold`
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether the text counts as garbled; empty text never does
    pub fn is_garbled(&self, text: &str) -> bool {
        disallowed_fraction(text).is_some_and(|fraction| fraction > self.threshold)
    }
}

impl Default for GarbledTextFilter {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Stage for GarbledTextFilter {
    fn name(&self) -> &'static str {
        "garbled-text"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::ContentQuality
    }

    fn accepts(&self, record: &Record) -> bool {
        !self.is_garbled(record.content().unwrap_or_default())
    }
}

/// Accepts only records whose target-script fraction exceeds a threshold
#[derive(Debug, Clone)]
pub struct ScriptRatioFilter {
    threshold: f64,
    ranges: Vec<RangeInclusive<char>>,
}

impl ScriptRatioFilter {
    /// Require more than `threshold` of the characters to be CJK ideographs
    pub fn new(threshold: f64) -> Self {
        Self::with_ranges(threshold, vec![CJK_IDEOGRAPHS])
    }

    /// Require more than `threshold` of the characters to fall in `ranges`
    pub fn with_ranges(threshold: f64, ranges: Vec<RangeInclusive<char>>) -> Self {
        Self { threshold, ranges }
    }

    /// Whether the text is majority target script; empty text never is
    pub fn is_majority_script(&self, text: &str) -> bool {
        script_fraction(text, &self.ranges).is_some_and(|fraction| fraction > self.threshold)
    }
}

impl Default for ScriptRatioFilter {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Stage for ScriptRatioFilter {
    fn name(&self) -> &'static str {
        "script-ratio"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::ContentQuality
    }

    fn accepts(&self, record: &Record) -> bool {
        self.is_majority_script(record.content().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::ValidationOutcome;
    use serde_json::json;

    #[test]
    fn test_allowed_set() {
        for c in ['a', '~', '\n', '中', '。', '“', '\u{3000}'] {
            assert!(is_allowed_char(c), "{c:?} should be allowed");
        }
        for c in ['é', 'Ж', 'あ', '😀', '\u{FFFD}'] {
            assert!(!is_allowed_char(c), "{c:?} should not be allowed");
        }
    }

    #[test]
    fn test_garbled_threshold_is_exclusive() {
        let filter = GarbledTextFilter::default();
        assert!(!filter.is_garbled("ab\u{FFFD}\u{FFFD}"));
        assert!(filter.is_garbled("a\u{FFFD}\u{FFFD}"));
        assert!(!filter.is_garbled("纯中文内容，没有问题。"));
    }

    #[test]
    fn test_empty_content_asymmetry() {
        let empty = Record::text("");
        assert!(GarbledTextFilter::default().apply(empty.clone()).is_accepted());
        assert_eq!(
            ScriptRatioFilter::default().apply(empty).reason(),
            Some(RejectReason::ContentQuality)
        );

        let no_content = Record::from_value(json!({"conversations": []})).unwrap();
        assert!(GarbledTextFilter::default().apply(no_content.clone()).is_accepted());
        assert!(!ScriptRatioFilter::default().apply(no_content).is_accepted());
    }

    #[test]
    fn test_script_ratio() {
        let filter = ScriptRatioFilter::default();
        assert!(filter.is_majority_script("中文abc中文"));
        assert!(!filter.is_majority_script("中文ab"));
        assert!(!filter.is_majority_script("english only"));
    }

    #[test]
    fn test_custom_script_ranges() {
        let cyrillic = ScriptRatioFilter::with_ranges(0.5, vec!['\u{0400}'..='\u{04FF}']);
        assert!(cyrillic.is_majority_script("привет"));
        assert!(!cyrillic.is_majority_script("hello"));
    }

    #[test]
    fn test_garbled_rejection_reason() {
        let outcome = GarbledTextFilter::default().apply(Record::text("ÿÿÿÿ"));
        assert!(matches!(
            outcome,
            ValidationOutcome::Rejected(r) if r.stage == "garbled-text" && r.reason == RejectReason::ContentQuality
        ));
    }
}
