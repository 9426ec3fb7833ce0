//! Background Tasks Module
//!
//! Periodic work owned by the cache.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at the configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
