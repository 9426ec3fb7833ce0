//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde::{Deserialize, Serialize};

use crate::cache::Payload;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// All times are milliseconds read from the cache's clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored payload, run-length encoded when `compressed` is set
    pub data: Payload,
    /// Creation time
    pub timestamp: u64,
    /// Lifetime measured from `timestamp`
    pub ttl: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Time of the most recent successful read (creation time until then)
    pub last_accessed: u64,
    /// Byte-size estimate of `data`
    pub size: usize,
    #[serde(default)]
    pub compressed: bool,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped at `now`.
    pub fn new(data: Payload, now: u64, ttl: u64, compressed: bool) -> Self {
        let size = data.size_bytes();
        Self {
            data,
            timestamp: now,
            ttl,
            access_count: 0,
            last_accessed: now,
            size,
            compressed,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is live while `now - timestamp <= ttl`; the lazy read path
    /// and the background sweep both use this one predicate.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    pub fn is_live(&self, now: u64) -> bool {
        !self.is_expired(now)
    }

    // == Record Access ==
    /// Marks a successful read at `now`.
    pub fn record_access(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}
