//! Log Output Module
//!
//! The sink abstraction every logger output implements, plus an in-memory
//! sink that keeps the most recent entries.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LogResult;
use crate::logging::LogEntry;

// == Log Output Trait ==
/// A destination for log entries.
///
/// `flush` and `close` default to no-ops for outputs that hold no state.
#[async_trait]
pub trait LogOutput: Send + Sync {
    /// Short name used when reporting this output's failures.
    fn name(&self) -> &str;

    async fn write(&self, entry: &LogEntry) -> LogResult<()>;

    async fn flush(&self) -> LogResult<()> {
        Ok(())
    }

    async fn close(&self) -> LogResult<()> {
        Ok(())
    }
}

// == Memory Output ==
/// Keeps the last `capacity` entries in memory, e.g. for a recent-activity
/// view.
#[derive(Debug)]
pub struct MemoryOutput {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl MemoryOutput {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Snapshot of retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl LogOutput for MemoryOutput {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, entry: &LogEntry) -> LogResult<()> {
        let mut entries = self.entries.lock();
        if self.capacity == 0 {
            return Ok(());
        }
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Ok(())
    }
}
