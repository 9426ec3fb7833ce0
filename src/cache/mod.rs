//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction, optional
//! compression and optional snapshot persistence.

mod clock;
pub mod compression;
pub mod domain;
mod entry;
mod lru;
mod manager;
mod payload;
mod stats;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use manager::{CacheManager, WeakCacheManager, PERSISTENCE_KEY, SNAPSHOT_MAX_AGE_MS};
pub use payload::Payload;
pub use stats::{CacheCounters, CacheStats};
