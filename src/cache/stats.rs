//! Cache Statistics Module
//!
//! Cumulative request counters and the derived statistics snapshot.

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;

// == Cache Counters ==
/// Cumulative counters, persisted alongside the entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub evictions: u64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful lookup.
    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.total_requests += 1;
    }

    /// Counts a lookup that found nothing live.
    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.total_requests += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Cache Stats ==
/// Point-in-time statistics. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    /// Sum of live entries' sizes in bytes
    pub total_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub eviction_count: u64,
    /// Creation time of the oldest live entry
    pub oldest_entry: Option<u64>,
    /// Creation time of the newest live entry
    pub newest_entry: Option<u64>,
}

impl CacheStats {
    /// Derives statistics from the counters and the live entries.
    pub fn compute<'a>(
        counters: &CacheCounters,
        live_entries: impl IntoIterator<Item = &'a CacheEntry>,
    ) -> Self {
        let mut total_entries = 0;
        let mut total_size = 0;
        let mut oldest_entry: Option<u64> = None;
        let mut newest_entry: Option<u64> = None;

        for entry in live_entries {
            total_entries += 1;
            total_size += entry.size;
            oldest_entry = Some(oldest_entry.map_or(entry.timestamp, |t| t.min(entry.timestamp)));
            newest_entry = Some(newest_entry.map_or(entry.timestamp, |t| t.max(entry.timestamp)));
        }

        Self {
            total_entries,
            total_size,
            hits: counters.hits,
            misses: counters.misses,
            total_requests: counters.total_requests,
            hit_rate: percentage(counters.hits, counters.total_requests),
            miss_rate: percentage(counters.misses, counters.total_requests),
            eviction_count: counters.evictions,
            oldest_entry,
            newest_entry,
        }
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
