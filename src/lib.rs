//! Playground Core - caching and structured logging for an interactive
//! graphics playground
//!
//! Provides a TTL/LRU cache with optional compression and snapshot
//! persistence, and a leveled logger fanning out to console, file and
//! remote outputs.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod tasks;

pub use cache::{CacheManager, CacheStats};
pub use config::{CacheConfig, CacheConfigUpdate, Environment, LoggerConfig};
pub use error::{LogError, StorageError};
pub use logging::{LogLevel, Logger};
pub use storage::{FileStore, MemoryStore, PersistentStore};
pub use tasks::spawn_cleanup_task;
