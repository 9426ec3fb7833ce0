//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakCacheManager;

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task sleeps for `interval` between sweeps and holds only a weak
/// handle, so it ends on its own once the cache is dropped. The returned
/// handle is owned by the cache and aborted by `destroy()`.
pub fn spawn_cleanup_task(cache: WeakCacheManager, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting cache cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(manager) = cache.upgrade() else {
                debug!("Cache dropped, stopping cleanup task");
                break;
            };

            let removed = manager.cleanup_expired();
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
