//! Playground Core - demo composition root
//!
//! Wires one cache and one logger together, warms the cache through the
//! domain wrappers and runs until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playground_core::cache::{domain, SystemClock};
use playground_core::logging::log_context;
use playground_core::{CacheConfig, CacheManager, Environment, FileStore, Logger};

/// Directory holding the persisted cache snapshot.
const CACHE_DIRECTORY: &str = ".cache";

/// # Startup Sequence
/// 1. Initialize tracing subscriber for diagnostics
/// 2. Resolve the environment from `APP_ENV`
/// 3. Create the cache and start its expiry sweep
/// 4. Create the logger with the environment's outputs
/// 5. Warm the cache and report its statistics
/// 6. Wait for SIGINT/SIGTERM, then destroy the cache and close the logger
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playground_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let environment = Environment::from_env();
    info!(?environment, "Starting playground core");

    let config = CacheConfig {
        enable_persistence: environment.is_production(),
        ..CacheConfig::default()
    };
    let store = FileStore::new(CACHE_DIRECTORY).context("failed to open cache directory")?;
    let cache = CacheManager::new(config, Arc::new(store), Arc::new(SystemClock));
    cache.start_cleanup();

    let logger = Logger::for_environment(environment);
    logger
        .system_event("startup", log_context(json!({ "environment": format!("{:?}", environment) })))
        .await;

    warm_cache(&cache, &logger).await;

    let stats = cache.stats();
    logger
        .info(
            "Cache warmed",
            log_context(serde_json::to_value(&stats).context("failed to serialize cache stats")?),
        )
        .await;

    shutdown_signal().await;

    cache.destroy();
    logger.system_event("shutdown", None).await;
    logger.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Stores and reads back one item per domain wrapper.
async fn warm_cache(cache: &CacheManager, logger: &Logger) {
    let child = logger.child(log_context(json!({ "component": "cache-warmup" })).unwrap_or_default());

    domain::cache_shader(
        cache,
        "gradient",
        "void main() { gl_FragColor = vec4(gl_FragCoord.xy / 512.0, 0.5, 1.0); }",
    );
    domain::cache_experiment(cache, "mandelbrot", &json!({ "iterations": 256, "zoom": 1.5 }));
    domain::cache_performance_metrics(cache, "frame", &json!({ "fps": 60.0, "frameMs": 16.5 }));
    domain::cache_texture(cache, "checker", &[0u8, 255, 0, 255]);
    domain::cache_compiled_program(cache, "gradient", &json!({ "uniforms": ["u_time"] }));

    let shader_found = domain::get_shader(cache, "gradient").is_some();
    let texture_bytes = domain::get_texture(cache, "checker").map_or(0, |bytes| bytes.len());
    child
        .debug(
            "Read back cached items",
            log_context(json!({ "shaderFound": shader_found, "textureBytes": texture_bytes })),
        )
        .await;
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
