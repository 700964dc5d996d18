//! Versioned key/value store with optimistic commits.
//!
//! # Responsibilities
//! - Hand out snapshots (value + version) of a key
//! - Commit a new value only if the key is still at the snapshot's version
//! - Report a lost race as a `WriteConflict`
//!
//! # Design Decisions
//! - Compare-and-set happens under the DashMap shard lock for the key
//! - Missing keys read as value 0 at version 0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::resilience::conflict::WriteConflict;

/// A value and the number of commits that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Versioned {
    pub value: i64,
    pub version: u64,
}

/// Thread-safe store shared by every request.
#[derive(Debug, Clone, Default)]
pub struct VersionedStore {
    inner: Arc<DashMap<String, Versioned>>,
    contention_delay: Duration,
}

impl VersionedStore {
    pub fn new(contention_delay: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            contention_delay,
        }
    }

    /// Pause applications take between reading and committing.
    pub fn contention_delay(&self) -> Duration {
        self.contention_delay
    }

    pub fn read(&self, key: &str) -> Versioned {
        self.inner.get(key).map(|r| *r.value()).unwrap_or_default()
    }

    /// Store `value` if `key` is still at `expected_version`.
    pub fn commit(
        &self,
        key: &str,
        expected_version: u64,
        value: i64,
    ) -> Result<Versioned, WriteConflict> {
        let mut entry = self.inner.entry(key.to_string()).or_default();
        if entry.version != expected_version {
            tracing::debug!(
                key,
                expected = expected_version,
                actual = entry.version,
                "Commit lost race"
            );
            return Err(WriteConflict::new(key, expected_version, entry.version));
        }
        entry.value = value;
        entry.version += 1;
        Ok(*entry)
    }

    /// Every key with its current state, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Versioned> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
