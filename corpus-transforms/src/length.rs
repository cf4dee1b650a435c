//! Length and size-budget stages

use corpus_core::{LengthBounds, Record, RejectReason, Stage};

/// Accepts records whose length lies within inclusive bounds
#[derive(Debug, Clone, Copy)]
pub struct LengthFilter {
    bounds: LengthBounds,
}

impl LengthFilter {
    /// Create a filter for `bounds`
    pub fn new(bounds: LengthBounds) -> Self {
        Self { bounds }
    }

    /// The configured bounds
    pub fn bounds(&self) -> LengthBounds {
        self.bounds
    }
}

impl Stage for LengthFilter {
    fn name(&self) -> &'static str {
        "length"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Length
    }

    fn accepts(&self, record: &Record) -> bool {
        self.bounds.contains(record.length(self.bounds.source))
    }
}

/// Rejects records whose serialized form is longer than a character budget
///
/// Counts against the whole record, not only its content, so it bounds what
/// a downstream consumer has to hold for one sample.
#[derive(Debug, Clone, Copy)]
pub struct SizeBudgetFilter {
    budget: usize,
}

impl SizeBudgetFilter {
    /// Create a filter allowing up to `budget` characters
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }
}

impl Stage for SizeBudgetFilter {
    fn name(&self) -> &'static str {
        "size-budget"
    }

    fn reason(&self) -> RejectReason {
        RejectReason::Length
    }

    fn accepts(&self, record: &Record) -> bool {
        record.serialized_size() <= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::LengthSource;
    use serde_json::json;
    use test_case::test_case;

    fn declared(length: u64) -> Record {
        Record::from_value(json!({"Content": "x", "Length": length})).unwrap()
    }

    #[test_case(255, false ; "below min")]
    #[test_case(256, true ; "at min")]
    #[test_case(700, true ; "inside")]
    #[test_case(1024, true ; "at max")]
    #[test_case(1025, false ; "above max")]
    fn test_bounds_are_inclusive(length: u64, accepted: bool) {
        let filter = LengthFilter::new(LengthBounds::new(256, 1024));
        assert_eq!(filter.apply(declared(length)).is_accepted(), accepted);
    }

    #[test]
    fn test_length_rejection_reason() {
        let filter = LengthFilter::new(LengthBounds::new(2, 3));
        assert_eq!(filter.apply(Record::text("a")).reason(), Some(RejectReason::Length));
        assert!(filter.apply(Record::text("ab")).is_accepted());
    }

    #[test]
    fn test_byte_length_source() {
        let bounds = LengthBounds {
            min: 0,
            max: 4,
            source: LengthSource::Bytes,
        };
        let filter = LengthFilter::new(bounds);
        assert!(filter.apply(Record::text("abcd")).is_accepted());
        assert!(!filter.apply(Record::text("中文")).is_accepted());
    }

    #[test]
    fn test_size_budget_counts_whole_record() {
        let record = Record::from_value(json!({"q": "abc"})).unwrap();
        let size = record.serialized_size();

        assert!(SizeBudgetFilter::new(size).apply(record.clone()).is_accepted());
        assert_eq!(
            SizeBudgetFilter::new(size - 1).apply(record).reason(),
            Some(RejectReason::Length)
        );
    }
}
