//! Memory usage samples and the invariants they are checked against.
//!
//! A sample is well formed when
//! `init >= -1`, `used >= 0`, `committed >= 0`, `used <= committed`,
//! `max >= -1` and either `max == -1` or `committed <= max`.
//! Samples that break these rules are still stored verbatim; the checks
//! here only decide what gets reported.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Value used by collectors for an undefined `init` or `max`.
pub const UNDEFINED: i64 = -1;

/// One pool's counters at a single instant, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageSample {
    pub init: i64,
    pub used: i64,
    pub committed: i64,
    pub max: i64,
}

impl UsageSample {
    pub fn new(init: i64, used: i64, committed: i64, max: i64) -> Self {
        Self {
            init,
            used,
            committed,
            max,
        }
    }

    /// Returns every invariant this sample breaks, in a fixed order.
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        if self.init < UNDEFINED {
            out.push(Violation::InitBelowUndefined);
        }
        if self.used < 0 {
            out.push(Violation::NegativeUsed);
        }
        if self.committed < 0 {
            out.push(Violation::NegativeCommitted);
        }
        if self.used > self.committed {
            out.push(Violation::UsedExceedsCommitted);
        }
        if self.max != UNDEFINED && self.committed > self.max {
            out.push(Violation::CommittedExceedsMax);
        }
        if self.max < UNDEFINED {
            out.push(Violation::MaxBelowUndefined);
        }
        out
    }

    pub fn is_well_formed(&self) -> bool {
        self.violations().is_empty()
    }
}

impl fmt::Display for UsageSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "init={}, used={}, committed={}, max={}",
            self.init, self.used, self.committed, self.max
        )
    }
}

/// Which side of the collection a sample was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    BeforeGc,
    AfterGc,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeGc => "BeforeGc",
            Phase::AfterGc => "AfterGc",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single broken invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Violation {
    InitBelowUndefined,
    NegativeUsed,
    NegativeCommitted,
    UsedExceedsCommitted,
    CommittedExceedsMax,
    MaxBelowUndefined,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Violation::InitBelowUndefined => "init is negative but not -1",
            Violation::NegativeUsed => "used is negative",
            Violation::NegativeCommitted => "committed is negative",
            Violation::UsedExceedsCommitted => "used is greater than committed",
            Violation::CommittedExceedsMax => "committed is greater than max",
            Violation::MaxBelowUndefined => "max is negative but not -1",
        };
        f.write_str(text)
    }
}

/// Validates one sample of one pool and reports a diagnostic when it is
/// not well formed. Returns whether the sample passed.
pub fn validate(
    collection_index: i64,
    pool_index: usize,
    pool_name: &str,
    sample: &UsageSample,
    phase: Phase,
    sink: &dyn DiagnosticSink,
) -> bool {
    let violations = sample.violations();
    if violations.is_empty() {
        return true;
    }

    sink.emit(&Diagnostic::UsageViolation {
        collection_index,
        pool_index,
        pool_name: pool_name.to_string(),
        phase,
        sample: *sample,
        violations,
    });
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    #[test]
    fn test_well_formed_samples() {
        assert!(UsageSample::new(0, 100, 150, -1).is_well_formed());
        assert!(UsageSample::new(-1, 0, 0, -1).is_well_formed());
        assert!(UsageSample::new(0, 60, 60, 60).is_well_formed());
        assert!(UsageSample::new(0, 0, 0, 0).is_well_formed());
    }

    #[test]
    fn test_used_exceeds_committed() {
        let sample = UsageSample::new(0, 300, 250, -1);
        assert_eq!(sample.violations(), vec![Violation::UsedExceedsCommitted]);
    }

    #[test]
    fn test_committed_exceeds_defined_max() {
        let sample = UsageSample::new(0, 10, 120, 100);
        assert_eq!(sample.violations(), vec![Violation::CommittedExceedsMax]);
        // an undefined max never limits committed
        assert!(UsageSample::new(0, 10, i64::MAX, -1).is_well_formed());
    }

    #[test]
    fn test_negative_values_are_classified() {
        let sample = UsageSample::new(-2, -5, -3, -7);
        assert_eq!(
            sample.violations(),
            vec![
                Violation::InitBelowUndefined,
                Violation::NegativeUsed,
                Violation::NegativeCommitted,
                Violation::CommittedExceedsMax,
                Violation::MaxBelowUndefined,
            ]
        );
    }

    #[test]
    fn test_validate_reports_once_with_phase() {
        let sink = CollectingSink::new();
        let sample = UsageSample::new(0, 300, 250, -1);

        assert!(!validate(42, 1, "heap-old", &sample, Phase::BeforeGc, &sink));

        let recorded = sink.take();
        assert_eq!(recorded.len(), 1);
        match &recorded[0] {
            Diagnostic::UsageViolation {
                collection_index,
                pool_index,
                pool_name,
                phase,
                sample: reported,
                violations,
            } => {
                assert_eq!(*collection_index, 42);
                assert_eq!(*pool_index, 1);
                assert_eq!(pool_name, "heap-old");
                assert_eq!(*phase, Phase::BeforeGc);
                assert_eq!(reported, &sample);
                assert_eq!(violations, &vec![Violation::UsedExceedsCommitted]);
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn test_validate_is_silent_for_valid_sample() {
        let sink = CollectingSink::new();
        assert!(validate(
            1,
            0,
            "heap-young",
            &UsageSample::new(0, 100, 150, -1),
            Phase::AfterGc,
            &sink
        ));
        assert!(sink.is_empty());
    }
}
