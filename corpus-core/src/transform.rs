//! The stage trait and the validator chain

use std::fmt;

use crate::record::{Record, RejectReason, Rejection, ValidationOutcome};

/// A single step of the validator chain
///
/// A stage either passes a record through (possibly reshaped) or rejects it.
/// Plain predicates implement [`Stage::accepts`] and keep the default
/// [`Stage::apply`]; reshaping stages override `apply`. Stages are pure: the
/// same record and configuration always produce the same outcome.
pub trait Stage: Send + Sync {
    /// Name of this stage, recorded on rejections
    fn name(&self) -> &'static str;

    /// Reason recorded when this stage rejects
    fn reason(&self) -> RejectReason;

    /// Whether the record passes
    fn accepts(&self, _record: &Record) -> bool {
        true
    }

    /// Accept, reshape or reject a record
    fn apply(&self, record: Record) -> ValidationOutcome {
        if self.accepts(&record) {
            ValidationOutcome::Accepted(record)
        } else {
            ValidationOutcome::Rejected(Rejection::new(self.reason(), self.name()))
        }
    }
}

/// An ordered chain of stages applied as one
///
/// The chain short-circuits: the first rejecting stage decides the outcome
/// and the remaining stages do not run.
#[derive(Default)]
pub struct ValidatorChain {
    /// The stages, in application order
    stages: Vec<Box<dyn Stage>>,
}

impl ValidatorChain {
    /// Create a new chain from stages in application order
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Append a stage
    pub fn push(&mut self, stage: impl Stage + 'static) {
        self.stages.push(Box::new(stage));
    }

    /// Append a stage, builder style
    #[must_use]
    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.push(stage);
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the chain has no stages (accepts everything)
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of the stages in application order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run a record through every stage
    pub fn apply(&self, record: Record) -> ValidationOutcome {
        let mut current = record;

        for stage in &self.stages {
            match stage.apply(current) {
                ValidationOutcome::Accepted(next) => current = next,
                rejected @ ValidationOutcome::Rejected(_) => return rejected,
            }
        }

        ValidationOutcome::Accepted(current)
    }
}

impl fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBody;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NonEmpty;

    impl Stage for NonEmpty {
        fn name(&self) -> &'static str {
            "non-empty"
        }

        fn reason(&self) -> RejectReason {
            RejectReason::Length
        }

        fn accepts(&self, record: &Record) -> bool {
            record.content().is_some_and(|c| !c.is_empty())
        }
    }

    struct Upper;

    impl Stage for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn reason(&self) -> RejectReason {
            RejectReason::Schema
        }

        fn apply(&self, record: Record) -> ValidationOutcome {
            let upper = record.content().unwrap_or_default().to_uppercase();
            ValidationOutcome::Accepted(record.derive(RecordBody::Text(upper)))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Stage for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn reason(&self) -> RejectReason {
            RejectReason::Schema
        }

        fn accepts(&self, _record: &Record) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_empty_chain_accepts() {
        let chain = ValidatorChain::default();
        assert!(chain.is_empty());
        assert!(chain.apply(Record::text("")).is_accepted());
    }

    #[test]
    fn test_chain_reshapes_in_order() {
        let chain = ValidatorChain::default().with(Upper).with(NonEmpty);
        let outcome = chain.apply(Record::text("abc"));
        assert_eq!(outcome.accepted().unwrap().content(), Some("ABC"));
    }

    #[test]
    fn test_chain_short_circuits_on_first_rejection() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ValidatorChain::default()
            .with(NonEmpty)
            .with(Counting(calls.clone()));

        let outcome = chain.apply(Record::text(""));
        assert_eq!(
            outcome,
            ValidationOutcome::Rejected(Rejection::new(RejectReason::Length, "non-empty"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(chain.apply(Record::text("x")).is_accepted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stage_names() {
        let chain = ValidatorChain::default().with(NonEmpty).with(Upper);
        assert_eq!(chain.stage_names(), vec!["non-empty", "upper"]);
    }
}
