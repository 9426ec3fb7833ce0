//! Cache Manager Module
//!
//! Main cache engine: TTL expiry, LRU eviction under a byte budget and an
//! entry budget, hit/miss statistics, and optional snapshot persistence.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    compression, CacheCounters, CacheEntry, CacheStats, Clock, LruTracker, Payload, SystemClock,
};
use crate::config::{CacheConfig, CacheConfigUpdate};
use crate::storage::{MemoryStore, PersistentStore};
use crate::tasks::spawn_cleanup_task;

/// Durable store key holding the cache snapshot.
pub const PERSISTENCE_KEY: &str = "playground-cache";

/// Snapshots older than this are discarded on load.
pub const SNAPSHOT_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;

// == Snapshot ==
#[derive(Serialize)]
struct SnapshotRef<'a> {
    entries: Vec<(&'a String, &'a CacheEntry)>,
    stats: CacheCounters,
    timestamp: u64,
}

#[derive(Deserialize)]
struct Snapshot {
    entries: Vec<(String, CacheEntry)>,
    stats: CacheCounters,
    timestamp: u64,
}

// == Cache State ==
/// Everything guarded by the store lock.
#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    counters: CacheCounters,
    /// Sum of `size` over `entries`
    current_size: usize,
    config: CacheConfig,
}

impl CacheState {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            counters: CacheCounters::new(),
            current_size: 0,
            config,
        }
    }

    fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        self.current_size += entry.size;
        self.lru.touch(&key);
        if let Some(old) = self.entries.insert(key, entry) {
            self.current_size -= old.size;
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_size -= entry.size;
        self.lru.remove(key);
        Some(entry)
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.current_size = 0;
        self.counters.reset();
    }

    /// Whether an entry of `required` bytes fits, not counting the entry
    /// it would replace.
    fn fits(&self, required: usize, replacing: Option<&str>) -> bool {
        let (replaced_size, replaced_count) = replacing
            .and_then(|key| self.entries.get(key))
            .map_or((0, 0), |entry| (entry.size, 1));

        self.current_size - replaced_size + required <= self.config.max_size
            && self.entries.len() - replaced_count < self.config.max_entries
    }

    // == Make Space ==
    /// Evicts least recently accessed entries until an entry of `required`
    /// bytes fits both budgets.
    ///
    /// The entry under `replacing` is never a victim. Returns whether the
    /// new entry now fits.
    fn make_space(&mut self, required: usize, replacing: Option<&str>) -> bool {
        if required > self.config.max_size || self.config.max_entries == 0 {
            return false;
        }
        if self.fits(required, replacing) {
            return true;
        }

        let candidates: Vec<String> = self
            .lru
            .iter_oldest()
            .filter(|key| Some(key.as_str()) != replacing)
            .cloned()
            .collect();

        for key in candidates {
            if self.fits(required, replacing) {
                break;
            }
            if self.remove_entry(&key).is_some() {
                self.counters.record_eviction();
                debug!(key = %key, "Evicted least recently used cache entry");
            }
        }

        self.fits(required, replacing)
    }

    fn live_entries(&self, now: u64) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter().filter(move |(_, entry)| entry.is_live(now))
    }
}

// == Shared Internals ==
struct CacheShared {
    state: Mutex<CacheState>,
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CacheShared {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}

// == Cache Manager ==
/// Shared handle to one cache. Clones refer to the same store and counters.
#[derive(Clone)]
pub struct CacheManager {
    shared: Arc<CacheShared>,
}

/// Non-owning handle used by the background sweep.
#[derive(Clone)]
pub struct WeakCacheManager {
    shared: Weak<CacheShared>,
}

impl WeakCacheManager {
    /// Returns the cache if it is still alive.
    pub fn upgrade(&self) -> Option<CacheManager> {
        self.shared.upgrade().map(|shared| CacheManager { shared })
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CacheManager")
            .field("entries", &state.entries.len())
            .field("current_size", &state.current_size)
            .field("config", &state.config)
            .finish()
    }
}

impl CacheManager {
    // == Constructor ==
    /// Creates a cache over `store`, reading time from `clock`.
    ///
    /// With persistence enabled the cache hydrates from the store's
    /// snapshot. The background sweep is not started; see
    /// [`CacheManager::start_cleanup`].
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persistence = config.enable_persistence;
        let manager = Self {
            shared: Arc::new(CacheShared {
                state: Mutex::new(CacheState::new(config)),
                store,
                clock,
                cleanup: Mutex::new(None),
            }),
        };

        if persistence {
            manager.load_from_storage();
        }

        manager
    }

    /// Default configuration over an in-memory store and the system clock.
    pub fn with_defaults() -> Self {
        Self::new(
            CacheConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn downgrade(&self) -> WeakCacheManager {
        WeakCacheManager {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn now(&self) -> u64 {
        self.shared.clock.now_ms()
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl` ms, or the default TTL.
    ///
    /// Overwriting replaces the entry entirely. Returns false, leaving the
    /// cache without the new value, if no room can be made for it.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        match Payload::from_serializable(value) {
            Ok(payload) => self.insert(key, payload, ttl),
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to serialize cache value");
                false
            }
        }
    }

    /// Stores a binary buffer under `key`.
    pub fn set_bytes(&self, key: &str, bytes: impl Into<Vec<u8>>, ttl: Option<u64>) -> bool {
        self.insert(key, Payload::Bytes(bytes.into()), ttl)
    }

    fn insert(&self, key: &str, payload: Payload, ttl: Option<u64>) -> bool {
        let now = self.now();
        let mut state = self.shared.state.lock();

        let ttl = ttl.unwrap_or(state.config.default_ttl);
        let (data, compressed) = compression::encode(payload, state.config.enable_compression);
        let entry = CacheEntry::new(data, now, ttl, compressed);

        if !state.make_space(entry.size, Some(key)) {
            debug!(key = %key, size = entry.size, "No room in cache, value not stored");
            return false;
        }

        state.insert_entry(key.to_string(), entry);

        if state.config.enable_persistence {
            self.persist(&state, now);
        }
        true
    }

    // == Get ==
    /// Returns the live value under `key`.
    ///
    /// Every call counts as a hit or a miss. An expired entry is removed and
    /// counted as a miss. A live value that does not decode as `T` still
    /// counts as a hit but returns `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.lookup(key)?;
        match payload.decode() {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key = %key, error = %err, "Cached value has a different type");
                None
            }
        }
    }

    /// Returns the live binary buffer under `key`.
    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.lookup(key)? {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn lookup(&self, key: &str) -> Option<Payload> {
        let now = self.now();
        let mut state = self.shared.state.lock();

        let expired = match state.entries.get(key).map(|entry| entry.is_expired(now)) {
            Some(expired) => expired,
            None => {
                state.counters.record_miss();
                return None;
            }
        };

        if expired {
            state.remove_entry(key);
            state.counters.record_miss();
            debug!(key = %key, "Removed expired cache entry on read");
            return None;
        }

        let entry = state.entries.get_mut(key)?;
        entry.record_access(now);
        let (data, compressed) = (entry.data.clone(), entry.compressed);
        state.lru.touch(key);
        state.counters.record_hit();
        drop(state);

        let decoded = compression::decode(data, compressed);
        if decoded.is_none() {
            warn!(key = %key, "Failed to decompress cached value");
        }
        decoded
    }

    // == Has ==
    /// True if `key` is present and live. Touches neither statistics nor
    /// recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.now();
        self.shared
            .state
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    // == Delete ==
    /// Removes `key`, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let now = self.now();
        let mut state = self.shared.state.lock();

        let removed = state.remove_entry(key).is_some();
        if removed && state.config.enable_persistence {
            self.persist(&state, now);
        }
        removed
    }

    // == Clear ==
    /// Removes every entry and zeroes the counters.
    pub fn clear(&self) {
        let now = self.now();
        let mut state = self.shared.state.lock();

        state.reset();
        if state.config.enable_persistence {
            self.persist(&state, now);
        }
        info!("Cache cleared");
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.now();
        let state = self.shared.state.lock();
        CacheStats::compute(&state.counters, state.live_entries(now).map(|(_, e)| e))
    }

    // == Configure ==
    /// Merges `update` into the configuration.
    ///
    /// Existing entries are kept as they are; new limits apply from the
    /// next `set`. A running sweep is restarted when its interval changes.
    pub fn configure(&self, update: CacheConfigUpdate) {
        let interval_changed = {
            let mut state = self.shared.state.lock();
            let previous = state.config.cleanup_interval;
            state.config.apply(update);
            debug!(config = ?state.config, "Cache reconfigured");
            state.config.cleanup_interval != previous
        };

        if interval_changed && self.is_cleanup_running() {
            self.start_cleanup();
        }
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> CacheConfig {
        self.shared.state.lock().config.clone()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.now();
        let mut state = self.shared.state.lock();

        let expired_keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            state.remove_entry(key);
        }

        if !expired_keys.is_empty() && state.config.enable_persistence {
            self.persist(&state, now);
        }
        expired_keys.len()
    }

    // == Background Sweep ==
    /// Starts (or restarts) the periodic expiry sweep on the current tokio
    /// runtime. Returns false when called outside a runtime.
    pub fn start_cleanup(&self) -> bool {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No tokio runtime available, cache cleanup sweep not started");
            return false;
        }

        let interval = Duration::from_millis(self.config().cleanup_interval.max(1));
        let handle = spawn_cleanup_task(self.downgrade(), interval);

        if let Some(previous) = self.shared.cleanup.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    /// Whether the background sweep is scheduled.
    pub fn is_cleanup_running(&self) -> bool {
        self.shared
            .cleanup
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Destroy ==
    /// Stops the sweep and drops every in-memory entry.
    ///
    /// The persisted snapshot is left in place so a new cache over the same
    /// store can restore it.
    pub fn destroy(&self) {
        if let Some(handle) = self.shared.cleanup.lock().take() {
            handle.abort();
        }
        self.shared.state.lock().reset();
        info!("Cache destroyed");
    }

    // == Introspection ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().entries.is_empty()
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.now();
        let state = self.shared.state.lock();
        let mut keys: Vec<String> = state.live_entries(now).map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys
    }

    // == Persistence ==
    fn persist(&self, state: &CacheState, now: u64) {
        let snapshot = SnapshotRef {
            entries: state.live_entries(now).collect(),
            stats: state.counters,
            timestamp: now,
        };

        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Failed to serialize cache snapshot");
                return;
            }
        };

        if let Err(err) = self.shared.store.set_item(PERSISTENCE_KEY, &raw) {
            warn!(error = %err, "Failed to persist cache snapshot");
        }
    }

    fn load_from_storage(&self) {
        let raw = match self.shared.store.get_item(PERSISTENCE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "Failed to read cache snapshot");
                return;
            }
        };

        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable cache snapshot");
                return;
            }
        };

        let now = self.now();
        if now.saturating_sub(snapshot.timestamp) > SNAPSHOT_MAX_AGE_MS {
            info!("Discarding cache snapshot older than 24h");
            if let Err(err) = self.shared.store.remove_item(PERSISTENCE_KEY) {
                warn!(error = %err, "Failed to remove stale cache snapshot");
            }
            return;
        }

        let mut live: Vec<(String, CacheEntry)> = snapshot
            .entries
            .into_iter()
            .filter(|(_, entry)| entry.is_live(now))
            .collect();
        // Rebuild recency in the order entries were last read.
        live.sort_by_key(|(_, entry)| entry.last_accessed);

        let mut state = self.shared.state.lock();
        let mut loaded = 0usize;
        for (key, mut entry) in live {
            // Sizes are derived from the data, never taken from the snapshot.
            entry.size = entry.data.size_bytes();
            if !decodes_within(&entry, state.config.max_size) {
                warn!(key = %key, "Dropping undecodable entry from cache snapshot");
                continue;
            }
            if !state.make_space(entry.size, Some(key.as_str())) {
                warn!(key = %key, size = entry.size, "Dropping oversized entry from cache snapshot");
                continue;
            }
            state.insert_entry(key, entry);
            loaded += 1;
        }
        state.counters = snapshot.stats;
        info!(entries = loaded, "Restored cache from snapshot");
    }
}

/// Whether a restored entry decompresses to a value within `max_size` bytes.
fn decodes_within(entry: &CacheEntry, max_size: usize) -> bool {
    if !entry.compressed {
        return true;
    }
    compression::decode(entry.data.clone(), true).is_some_and(|payload| payload.size_bytes() <= max_size)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::{StorageError, StorageResult};
    use serde_json::{json, Value};

    const START: u64 = 1_700_000_000_000;

    fn manager_with(config: CacheConfig) -> (CacheManager, ManualClock, MemoryStore) {
        let clock = ManualClock::new(START);
        let store = MemoryStore::new();
        let cache = CacheManager::new(config, Arc::new(store.clone()), Arc::new(clock.clone()));
        (cache, clock, store)
    }

    fn manager() -> (CacheManager, ManualClock) {
        let (cache, clock, _) = manager_with(CacheConfig::default());
        (cache, clock)
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl PersistentStore for BrokenStore {
        fn get_item(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("offline".to_string()))
        }
        fn set_item(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("offline".to_string()))
        }
        fn remove_item(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = manager();

        assert!(cache.set("key1", "value1", None));
        assert_eq!(cache.get::<String>("key1").as_deref(), Some("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent_is_miss() {
        let (cache, _) = manager();

        assert!(cache.get::<String>("nonexistent").is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[test]
    fn test_ttl_expiry_scenario() {
        let (cache, clock) = manager();

        assert!(cache.set("k", &json!({"v": 1}), Some(1000)));
        assert_eq!(cache.get::<Value>("k"), Some(json!({"v": 1})));

        clock.advance(1001);
        assert!(!cache.has("k"));
        assert_eq!(cache.get::<Value>("k"), None);
        assert_eq!(cache.len(), 0, "expired entry is removed on read");
    }

    #[test]
    fn test_entry_live_at_exact_ttl() {
        let (cache, clock) = manager();

        cache.set("k", "v", Some(1000));
        clock.advance(1000);
        assert!(cache.has("k"));
    }

    #[test]
    fn test_default_ttl_applies() {
        let (cache, clock) = manager();
        let default_ttl = cache.config().default_ttl;

        cache.set("implicit", "v", None);
        cache.set("explicit", "v", Some(default_ttl));

        clock.advance(default_ttl);
        assert!(cache.has("implicit"));
        assert!(cache.has("explicit"));

        clock.advance(1);
        assert!(!cache.has("implicit"));
        assert!(!cache.has("explicit"));
    }

    #[test]
    fn test_overwrite_resets_entry() {
        let (cache, clock) = manager();

        cache.set("key1", "value1", Some(1000));
        cache.get::<String>("key1");
        clock.advance(900);
        cache.set("key1", "value2", Some(1000));

        clock.advance(900);
        assert_eq!(cache.get::<String>("key1").as_deref(), Some("value2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_prefers_least_recently_read() {
        let (cache, _) = manager();
        cache.configure(CacheConfigUpdate {
            max_entries: Some(2),
            ..Default::default()
        });

        cache.set("k1", "a", None);
        cache.set("k2", "b", None);
        cache.get::<String>("k1");
        cache.set("k3", "c", None);

        assert!(cache.has("k1"));
        assert!(!cache.has("k2"));
        assert!(cache.has("k3"));
        assert_eq!(cache.stats().eviction_count, 1);
    }

    #[test]
    fn test_size_budget_evicts_until_fit() {
        let (cache, _, _) = manager_with(CacheConfig {
            max_size: 100,
            enable_compression: false,
            ..CacheConfig::default()
        });

        // 20 chars -> 40 bytes each
        cache.set("a", &"x".repeat(20), None);
        cache.set("b", &"y".repeat(20), None);
        cache.get::<String>("a");
        assert!(cache.set("c", &"z".repeat(20), None));

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.stats().total_size <= 100);
    }

    #[test]
    fn test_oversized_value_rejected_without_eviction() {
        let (cache, _, _) = manager_with(CacheConfig {
            max_size: 100,
            enable_compression: false,
            ..CacheConfig::default()
        });

        cache.set("small", "ok", None);
        assert!(!cache.set("huge", &"x".repeat(100), None));
        assert!(cache.has("small"));
        assert!(!cache.has("huge"));
        assert_eq!(cache.stats().eviction_count, 0);
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let (cache, _) = manager();
        cache.configure(CacheConfigUpdate {
            max_entries: Some(2),
            ..Default::default()
        });

        cache.set("k1", "a", None);
        cache.set("k2", "b", None);
        assert!(cache.set("k1", "a2", None));

        assert!(cache.has("k1"));
        assert!(cache.has("k2"));
        assert_eq!(cache.stats().eviction_count, 0);
    }

    #[test]
    fn test_has_is_pure() {
        let (cache, clock) = manager();

        cache.set("k", "v", Some(10));
        assert!(cache.has("k"));
        clock.advance(11);
        assert!(!cache.has("k"));

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(cache.len(), 1, "has does not remove expired entries");
    }

    #[test]
    fn test_delete() {
        let (cache, _) = manager();

        cache.set("key1", "value1", None);
        assert!(cache.delete("key1"));
        assert!(!cache.delete("key1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_resets_entries_and_stats() {
        let (cache, _) = manager();

        cache.set("a", "1", None);
        cache.set("b", "2", None);
        cache.get::<String>("a");
        cache.get::<String>("missing");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.hits, 0);
        assert!(!cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[test]
    fn test_hit_and_miss_rates() {
        let (cache, _) = manager();
        cache.set("k", "v", None);

        for _ in 0..3 {
            cache.get::<String>("k");
        }
        cache.get::<String>("nope");

        let stats = cache.stats();
        assert!((stats.hit_rate - 75.0).abs() < 1e-9);
        assert!((stats.miss_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_oldest_and_newest() {
        let (cache, clock) = manager();

        cache.set("first", "1", None);
        clock.advance(50);
        cache.set("second", "2", None);

        let stats = cache.stats();
        assert_eq!(stats.oldest_entry, Some(START));
        assert_eq!(stats.newest_entry, Some(START + 50));
    }

    #[test]
    fn test_compression_is_transparent() {
        let (cache, _) = manager();
        let text = "a".repeat(5000);

        assert!(cache.set("long", &text, None));
        assert!(cache.stats().total_size < 5000 * 2);
        assert_eq!(cache.get::<String>("long"), Some(text));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let (cache, _) = manager();

        cache.set_bytes("tex", vec![1u8, 2, 3, 4], None);
        assert_eq!(cache.get_bytes("tex"), Some(vec![1, 2, 3, 4]));
        assert_eq!(cache.stats().total_size, 4);
        assert!(cache.get_bytes("missing").is_none());
    }

    #[test]
    fn test_type_mismatch_counts_as_hit() {
        let (cache, _) = manager();

        cache.set("k", "text", None);
        assert!(cache.get::<u32>("k").is_none());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let (cache, clock) = manager();

        cache.set("key1", "value1", Some(1000));
        cache.set("key2", "value2", Some(10_000));
        clock.advance(1001);

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("key2"));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let config = CacheConfig {
            enable_persistence: true,
            ..CacheConfig::default()
        };
        let (cache, clock, store) = manager_with(config.clone());

        cache.set("kept", "v", Some(60_000));
        cache.set("short", "v", Some(100));
        cache.get::<String>("kept");
        cache.get::<String>("kept");
        cache.get::<String>("missing");
        // Counters reach the snapshot with the next mutation
        cache.set("other", "w", Some(60_000));
        let before = cache.stats();
        assert_eq!((before.hits, before.misses), (2, 1));
        cache.destroy();

        clock.advance(1_000);
        let restored = CacheManager::new(config, Arc::new(store), Arc::new(clock));

        let after = restored.stats();
        assert_eq!(after.hits, before.hits);
        assert_eq!(after.misses, before.misses);
        assert_eq!(after.total_requests, before.total_requests);
        assert_eq!(after.eviction_count, before.eviction_count);

        assert_eq!(restored.get::<String>("kept").as_deref(), Some("v"));
        assert!(!restored.has("short"));
        assert_eq!(restored.stats().hits, 3);
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let config = CacheConfig {
            enable_persistence: true,
            default_ttl: 3 * SNAPSHOT_MAX_AGE_MS,
            ..CacheConfig::default()
        };
        let (cache, clock, store) = manager_with(config.clone());

        cache.set("k", "v", None);
        cache.destroy();

        clock.advance(SNAPSHOT_MAX_AGE_MS + 1);
        let restored = CacheManager::new(config, Arc::new(store.clone()), Arc::new(clock));

        assert!(!restored.has("k"));
        assert!(store.get_item(PERSISTENCE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_ignored() {
        let store = MemoryStore::new();
        store.set_item(PERSISTENCE_KEY, "{not json").unwrap();

        let cache = CacheManager::new(
            CacheConfig {
                enable_persistence: true,
                ..CacheConfig::default()
            },
            Arc::new(store),
            Arc::new(ManualClock::new(START)),
        );

        assert!(cache.is_empty());
        assert!(cache.set("k", "v", None));
    }

    #[test]
    fn test_tampered_snapshot_entries_are_dropped() {
        let store = MemoryStore::new();
        let entry = |data: Value, size: u64, compressed: bool| {
            json!({
                "data": data,
                "timestamp": START,
                "ttl": 60_000,
                "accessCount": 0,
                "lastAccessed": START,
                "size": size,
                "compressed": compressed,
            })
        };
        let snapshot = json!({
            "entries": [
                ["bomb", entry(json!({"kind": "text", "value": "1000000000000000000:a"}), 2, true)],
                ["garbled", entry(json!({"kind": "text", "value": "not rle"}), 2, true)],
                ["huge", entry(json!({"kind": "text", "value": "ok"}), u64::MAX, false)],
                ["fine", entry(json!({"kind": "text", "value": "3:a"}), 0, true)],
            ],
            "stats": {"hits": 0, "misses": 0, "totalRequests": 0, "evictions": 0},
            "timestamp": START,
        });
        store.set_item(PERSISTENCE_KEY, &snapshot.to_string()).unwrap();

        let cache = CacheManager::new(
            CacheConfig {
                enable_persistence: true,
                ..CacheConfig::default()
            },
            Arc::new(store),
            Arc::new(ManualClock::new(START + 1)),
        );

        assert_eq!(cache.keys(), vec!["fine".to_string(), "huge".to_string()]);
        assert_eq!(cache.get::<String>("fine").as_deref(), Some("aaa"));
        assert_eq!(cache.get::<String>("huge").as_deref(), Some("ok"));
        assert_eq!(cache.stats().total_size, 6 + 4);
        assert!(cache.set("k", "v", None));
    }

    #[test]
    fn test_broken_store_does_not_fail_operations() {
        let cache = CacheManager::new(
            CacheConfig {
                enable_persistence: true,
                ..CacheConfig::default()
            },
            Arc::new(BrokenStore),
            Arc::new(ManualClock::new(START)),
        );

        assert!(cache.set("k", "v", None));
        assert_eq!(cache.get::<String>("k").as_deref(), Some("v"));
        assert!(cache.delete("k"));
        cache.clear();
    }

    #[test]
    fn test_destroy_without_runtime() {
        let (cache, _) = manager();

        assert!(!cache.start_cleanup());
        cache.set("k", "v", None);
        cache.destroy();

        assert!(cache.is_empty());
        assert!(!cache.is_cleanup_running());
    }

    #[test]
    fn test_keys_lists_live_entries() {
        let (cache, clock) = manager();

        cache.set("b", "1", None);
        cache.set("a", "2", None);
        cache.set("gone", "3", Some(5));
        clock.advance(10);

        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
