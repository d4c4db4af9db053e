//! Triple/value cache.
//!
//! Maps each normalized check to its verdict and to every call site that asked
//! for it. The first request for a key is authoritative and goes to the
//! reasoner; every later request only appends an occurrence.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::request::{CacheKey, Occurrence};

/// Verification status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Not (yet) found inconsistent. Also the final state of passed and timed-out checks.
    Pending,
    /// The relation contradicts the schema.
    RelationViolation,
    /// The data value contradicts a property constraint.
    ConstraintViolation,
}

impl CheckStatus {
    /// Numeric status code: `0`, `-1` or `-2`.
    #[must_use]
    pub fn code(self) -> i8 {
        match self {
            CheckStatus::Pending => 0,
            CheckStatus::RelationViolation => -1,
            CheckStatus::ConstraintViolation => -2,
        }
    }

    /// Returns true for either violation status.
    #[must_use]
    pub fn is_violation(self) -> bool {
        self != CheckStatus::Pending
    }
}

/// Verdict and call sites of one normalized check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Current verdict.
    pub status: CheckStatus,
    /// One record per request, in arrival order.
    pub occurrences: Vec<Occurrence>,
}

/// Result of recording a request in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key was new; the caller must run the verification.
    First,
    /// The key was already known; only the occurrence was appended.
    Duplicate {
        /// Occurrence count after appending.
        occurrences: usize,
        /// Verdict known so far.
        status: CheckStatus,
    },
}

/// Concurrent cache keyed by normalized check.
///
/// Iteration order is the key order, so reports are deterministic.
#[derive(Debug, Default)]
pub struct TripleCache {
    entries: Mutex<BTreeMap<CacheKey, CacheEntry>>,
}

impl TripleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one request for `key`. Insert-or-append is atomic.
    pub fn record(&self, key: CacheKey, occurrence: Occurrence) -> Lookup {
        match self.entries.lock().entry(key) {
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                entry.occurrences.push(occurrence);
                Lookup::Duplicate {
                    occurrences: entry.occurrences.len(),
                    status: entry.status,
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    status: CheckStatus::Pending,
                    occurrences: vec![occurrence],
                });
                Lookup::First
            }
        }
    }

    /// Sets the verdict for `key`. Returns the first occurrence, if the key exists.
    pub fn mark(&self, key: &CacheKey, status: CheckStatus) -> Option<Occurrence> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.status = status;
        entry.occurrences.first().cloned()
    }

    /// Drops the entry for `key` so that the next request for it is a first request again.
    ///
    /// Used when the check never reached a reasoner. Returns the dropped entry.
    pub fn forget(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().remove(key)
    }

    /// Current verdict of `key`.
    #[must_use]
    pub fn status(&self, key: &CacheKey) -> Option<CheckStatus> {
        self.entries.lock().get(key).map(|e| e.status)
    }

    /// Copy of the entry for `key`.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Consistent copy of every entry, in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(CacheKey, CacheEntry)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
