//! LRU Tracker Module
//!
//! Access-recency order used to pick eviction victims.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Every touch stamps the key with a strictly increasing tick, so keys read
/// within the same clock millisecond still have a total order.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Key -> tick of its last touch
    ticks: HashMap<String, u64>,
    /// Tick -> key, oldest first
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl LruTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, adding it if new.
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        if let Some(previous) = self.ticks.insert(key.to_string(), tick) {
            self.order.remove(&previous);
        }
        self.order.insert(tick, key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    /// Keys from least to most recently used.
    pub fn iter_oldest(&self) -> impl Iterator<Item = &String> {
        self.order.values()
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
        self.order.clear();
    }
}
