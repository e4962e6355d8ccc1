//! emberkv - durable in-memory LRU cache
//!
//! An HTTP key-value cache with TTL expiration, bounded LRU eviction, and
//! WAL-backed crash recovery.

use emberkv_cache::{BincodeCodec, Cache};
use emberkv_server::{create_router, AppState, Config};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if EMBERKV_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("EMBERKV_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("EMBERKV_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting emberkv");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Capacity: {} entries", config.cache.capacity);
    if config.storage.wal_enabled {
        tracing::info!("  WAL directory: {}", config.storage.wal_dir().display());
        tracing::info!(
            "  Durability: enabled (force_sync={}, segment_size={}MB, max_segments={})",
            config.storage.force_sync,
            config.storage.wal_max_file_size_mb,
            config.storage.wal_max_segments
        );
    } else {
        tracing::info!("  Durability: disabled (volatile cache)");
    }

    // Open the cache; this replays the WAL before any request is served.
    let cache = Arc::new(Cache::open(
        config.cache_config(),
        BincodeCodec::<String>::new(),
    )?);

    let router = create_router(AppState::new(Arc::clone(&cache)));

    let listener = tokio::net::TcpListener::bind(config.network.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush and fsync the WAL before exit.
    if let Err(e) = cache.close() {
        tracing::error!("Failed to close cache on shutdown: {}", e);
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Received shutdown signal, stopping server...");
}
