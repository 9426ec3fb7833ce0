//! Domain Cache Helpers
//!
//! Namespaced keys and fixed TTLs for the playground tools' cached data.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheManager;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

pub const EXPERIMENT_TTL_MS: u64 = 6 * HOUR_MS;
pub const SHADER_TTL_MS: u64 = 24 * HOUR_MS;
pub const PERFORMANCE_TTL_MS: u64 = 5 * MINUTE_MS;
pub const TEXTURE_TTL_MS: u64 = 12 * HOUR_MS;
pub const COMPILED_PROGRAM_TTL_MS: u64 = 24 * HOUR_MS;

fn namespaced(namespace: &str, id: &str) -> String {
    format!("{}:{}", namespace, id)
}

/// Caches experiment state for 6 hours.
pub fn cache_experiment<T: Serialize + ?Sized>(cache: &CacheManager, id: &str, data: &T) -> bool {
    cache.set(&namespaced("experiment", id), data, Some(EXPERIMENT_TTL_MS))
}

pub fn get_experiment<T: DeserializeOwned>(cache: &CacheManager, id: &str) -> Option<T> {
    cache.get(&namespaced("experiment", id))
}

/// Caches shader source for 24 hours.
pub fn cache_shader(cache: &CacheManager, id: &str, source: &str) -> bool {
    cache.set(&namespaced("shader", id), source, Some(SHADER_TTL_MS))
}

pub fn get_shader(cache: &CacheManager, id: &str) -> Option<String> {
    cache.get(&namespaced("shader", id))
}

/// Caches performance metrics for 5 minutes.
pub fn cache_performance_metrics<T: Serialize + ?Sized>(
    cache: &CacheManager,
    id: &str,
    metrics: &T,
) -> bool {
    cache.set(&namespaced("performance", id), metrics, Some(PERFORMANCE_TTL_MS))
}

pub fn get_performance_metrics<T: DeserializeOwned>(cache: &CacheManager, id: &str) -> Option<T> {
    cache.get(&namespaced("performance", id))
}

/// Caches a texture buffer for 12 hours.
pub fn cache_texture(cache: &CacheManager, id: &str, pixels: &[u8]) -> bool {
    cache.set_bytes(&namespaced("texture", id), pixels, Some(TEXTURE_TTL_MS))
}

pub fn get_texture(cache: &CacheManager, id: &str) -> Option<Vec<u8>> {
    cache.get_bytes(&namespaced("texture", id))
}

/// Caches a compiled shader program for 24 hours.
pub fn cache_compiled_program<T: Serialize + ?Sized>(
    cache: &CacheManager,
    id: &str,
    program: &T,
) -> bool {
    cache.set(&namespaced("compiled", id), program, Some(COMPILED_PROGRAM_TTL_MS))
}

pub fn get_compiled_program<T: DeserializeOwned>(cache: &CacheManager, id: &str) -> Option<T> {
    cache.get(&namespaced("compiled", id))
}
