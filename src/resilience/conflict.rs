//! Built-in conflict errors.
//!
//! Stores raise these when an optimistic transaction loses a race. Both are transient: the
//! same request is expected to succeed when replayed against fresh state.

use thiserror::Error;

/// A commit found the resource at a newer version than the one it read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write conflict on `{resource}`: read version {expected}, found version {actual}")]
pub struct WriteConflict {
    pub resource: String,
    pub expected: u64,
    pub actual: u64,
}

impl WriteConflict {
    pub fn new(resource: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self {
            resource: resource.into(),
            expected,
            actual,
        }
    }
}

/// A read observed state that changed underneath the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("read conflict on `{resource}`")]
pub struct ReadConflict {
    pub resource: String,
}

impl ReadConflict {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}
