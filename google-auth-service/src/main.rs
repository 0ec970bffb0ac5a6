use google_auth_service::{
    build_router,
    config::{AuthConfig, StorageBackend},
    services::{GoogleProvider, MemoryStorage, RedisStorage, Storage},
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    google_auth_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        auth_mode = ?config.auth_mode,
        mount = %config.mount_path,
        "Starting Google credential provider"
    );

    let storage: Arc<dyn Storage> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state, config and roles are not persisted");
            Arc::new(MemoryStorage::new())
        }
        StorageBackend::Redis => {
            let url = config
                .storage
                .redis_url
                .as_ref()
                .map(|url| url.expose_secret().clone())
                .unwrap_or_default();
            let redis = RedisStorage::new(&url, &config.storage.key_prefix)
                .await
                .map_err(AppError::StorageError)?;
            Arc::new(redis)
        }
    };
    storage.health_check().await.map_err(AppError::StorageError)?;
    tracing::info!(backend = ?config.storage.backend, "Storage initialized");

    let google = Arc::new(GoogleProvider::new(config.google.clone())?);
    let state = AppState::new(config.clone(), storage, google.clone(), google)?;

    let app = build_router(state).await?;

    let addr: SocketAddr = config.common.socket_addr()?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
