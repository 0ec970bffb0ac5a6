pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use crate::config::AuthConfig;
use crate::services::{
    ConfigStore, GroupsProvider, IdentityResolver, LoginOrchestrator, LoginSettings, RoleStore,
    StateStore, Storage, UserProvider,
};
use service_core::error::AppError;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub storage: Arc<dyn Storage>,
    pub config_store: ConfigStore,
    pub roles: RoleStore,
    pub orchestrator: LoginOrchestrator,
}

impl AppState {
    /// Wires the stores and the orchestrator over one storage backend and
    /// the given provider implementations.
    pub fn new(
        config: AuthConfig,
        storage: Arc<dyn Storage>,
        users: Arc<dyn UserProvider>,
        groups: Arc<dyn GroupsProvider>,
    ) -> Result<Self, AppError> {
        let auth_url = reqwest::Url::parse(&config.google.auth_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("GOOGLE_AUTH_URL is not a valid URL: {}", e))
        })?;

        let config_store = ConfigStore::new(storage.clone());
        let roles = RoleStore::new(storage.clone());
        let orchestrator = LoginOrchestrator::new(
            config_store.clone(),
            StateStore::new(storage.clone()),
            roles.clone(),
            IdentityResolver::new(users, groups),
            LoginSettings {
                mode: config.auth_mode,
                mount: config.mount_path.clone(),
                auth_url,
            },
        );

        Ok(Self {
            config,
            storage,
            config_store,
            roles,
            orchestrator,
        })
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Admin routes
    let admin_routes = Router::new()
        .route(
            "/config",
            get(handlers::read_config).post(handlers::write_config),
        )
        .route("/role", get(handlers::list_roles))
        .route("/roles", get(handlers::list_roles))
        .route(
            "/role/:name",
            get(handlers::read_role)
                .post(handlers::write_role)
                .put(handlers::write_role)
                .delete(handlers::delete_role),
        )
        .route("/users", get(handlers::list_users))
        .route(
            "/users/:name",
            get(handlers::read_user)
                .post(handlers::write_user)
                .put(handlers::write_user)
                .delete(handlers::delete_user),
        )
        .route("/renew", post(handlers::renew))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/cli_code_url", get(handlers::cli_code_url))
        .route("/code_url", get(handlers::cli_code_url))
        .route("/web_code_url", get(handlers::web_code_url))
        .route("/login", post(handlers::login))
        .merge(admin_routes)
        .with_state(state)
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware));

    Ok(app)
}
