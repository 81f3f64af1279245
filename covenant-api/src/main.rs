//! Covenant API Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use covenant_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, NoopNotifier, Notifier,
    StoreBackend, WebhookNotifier,
};
use covenant_pg::{PgConfig, PgStore};
use covenant_storage::{MemoryStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env();

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; state will not survive restarts");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let pg = PgStore::from_config(&PgConfig::from_env())
                .map_err(|e| ApiError::internal(format!("Failed to initialize store: {e}")))?;
            pg.migrate()
                .await
                .map_err(|e| ApiError::internal(format!("Failed to apply schema: {e}")))?;
            Arc::new(pg)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            config.webhook_secret.clone(),
        )),
        None => Arc::new(NoopNotifier),
    };

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.bind_port)
        .parse()
        .map_err(|e| ApiError::internal(format!("Invalid bind address: {e}")))?;

    let state = AppState::with_defaults(store, notifier, config);
    let app = create_api_router(state);

    tracing::info!(%addr, "starting Covenant API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal(format!("Server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
