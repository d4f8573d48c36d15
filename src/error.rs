//! Error types for snapshot construction.
//!
//! Invariant violations in the counters are never errors; they travel
//! through the diagnostic sink. Only structural problems end up here.

use std::fmt;

/// Failure reported by an external collection source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The collector id is not known to the source.
    UnknownCollector(i32),
    /// The source could not deliver data.
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::UnknownCollector(id) => write!(f, "unknown collector id {id}"),
            SourceError::Unavailable(reason) => write!(f, "collection source unavailable: {reason}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Error returned when a snapshot cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A raw counter array does not line up with the cached pool list.
    ArrayLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Fetching raw data from the collection source failed.
    Source(SourceError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::ArrayLengthMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "array `{field}` has {actual} entries but {expected} memory pools are registered"
            ),
            SnapshotError::Source(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Source(e) => Some(e),
            SnapshotError::ArrayLengthMismatch { .. } => None,
        }
    }
}

impl From<SourceError> for SnapshotError {
    fn from(e: SourceError) -> Self {
        SnapshotError::Source(e)
    }
}
