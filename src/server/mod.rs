use crate::cache::{start_purge_task, Cache, MemoryCache, RedisCache};
use crate::config::{CacheBackend, Config};
use crate::jobs::{FfmpegTranscoder, LocalJobQueue, TranscodeSettings};
use crate::streaming::{SegmentStore, SessionManager, StreamSettings};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    extract::State,
    routing::get,
    Json, Router,
};
use reelcast_db::pool::DbPool;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod error;
pub mod routes_stream;
pub mod routes_watch;

pub use error::{status_for, AppError};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub manager: Arc<SessionManager>,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes() -> Router<AppContext> {
    routes_watch::watch_routes().merge(routes_stream::stream_routes())
}

/// Liveness plus the settings clients pace themselves by.
async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": ctx.config.cache.backend,
        "heartbeat_ttl_secs": ctx.config.stream.heartbeat_ttl_secs,
    }))
}

/// Build the configured cache backend.
///
/// The memory backend gets a background purge task.
pub async fn build_cache(config: &Config) -> Result<Arc<dyn Cache>> {
    match config.cache.backend {
        CacheBackend::Memory => {
            let cache = MemoryCache::new();
            start_purge_task(cache.clone(), config.cache.purge_interval());
            tracing::info!("Using in-memory cache");
            Ok(Arc::new(cache))
        }
        CacheBackend::Redis => {
            let url = config
                .cache
                .redis_url
                .as_deref()
                .context("cache.redis_url is required for the redis backend")?;
            let cache = RedisCache::connect(url, config.cache.key_prefix.clone())
                .await
                .context("Failed to connect to Redis")?;
            Ok(Arc::new(cache))
        }
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config, db_pool: DbPool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let cache = build_cache(&config).await?;
    let transcoder = FfmpegTranscoder::new(
        TranscodeSettings::from_config(&config),
        SegmentStore::new(Arc::clone(&cache)),
    );
    let queue = LocalJobQueue::new(
        Arc::new(transcoder),
        config.transcoder.concurrency,
        config.stream.heartbeat_ttl(),
    );
    let manager = SessionManager::new(
        cache,
        Arc::new(queue.clone()),
        Arc::new(db_pool),
        StreamSettings::from_config(&config),
    );

    let ctx = AppContext {
        config: Arc::new(config),
        manager: Arc::new(manager),
    };

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    queue.shutdown();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
