//! Test helpers for google-auth-service integration tests.
//!
//! Builds the full router over in-memory storage and the provider mocks, and
//! drives it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use google_auth_service::{
    build_router,
    config::{
        AuthConfig, Environment, GoogleEndpointsConfig, SecurityConfig, StorageBackend,
        StorageConfig,
    },
    models::{Group, Identity, LeaseLimits},
    services::{AuthorizationMode, MemoryStorage, MockGroupsProvider, MockUserProvider},
    AppState,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
    pub users: Arc<MockUserProvider>,
    pub groups: Arc<MockGroupsProvider>,
}

pub fn test_config(mode: AuthorizationMode) -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "google-auth-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        auth_mode: mode,
        mount_path: "google".to_string(),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            redis_url: None,
            key_prefix: "test:".to_string(),
        },
        lease: LeaseLimits {
            default_ttl: 3600,
            max_ttl: 7200,
        },
        security: SecurityConfig {
            admin_api_key: Secret::new(TEST_ADMIN_API_KEY.to_string()),
        },
        google: GoogleEndpointsConfig::default(),
    }
}

pub fn identity(email: &str, domain: &str) -> Identity {
    let local = email.split('@').next().unwrap_or_default();
    Identity {
        email: email.to_string(),
        domain: domain.to_string(),
        given_name: local.to_string(),
        family_name: "Tester".to_string(),
        verified_email: true,
    }
}

pub fn group(email: &str) -> Group {
    Group {
        email: email.to_string(),
        name: email.to_string(),
        description: String::new(),
        aliases: Vec::new(),
    }
}

impl TestApp {
    pub async fn spawn(mode: AuthorizationMode) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let users = Arc::new(MockUserProvider::new());
        let groups = Arc::new(MockGroupsProvider::new());

        let state = AppState::new(
            test_config(mode),
            storage.clone(),
            users.clone(),
            groups.clone(),
        )
        .expect("Failed to build app state");
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            storage,
            users,
            groups,
        }
    }

    /// Spawns an app with both OAuth clients and the directory configured.
    pub async fn spawn_configured(mode: AuthorizationMode) -> Self {
        let app = Self::spawn(mode).await;
        let (status, _) = app
            .admin(
                Method::POST,
                "/config",
                Some(json!({
                    "cli_client_id": "cli-client",
                    "cli_client_secret": "cli-secret",
                    "cli_ttl": "10m",
                    "cli_max_ttl": "1h",
                    "web_client_id": "web-client",
                    "web_client_secret": "web-secret",
                    "web_redirect_url": "https://vault.example.com",
                    "web_ttl": 300,
                    "web_max_ttl": 900,
                    "directory_impersonate_user": "admin@a.com",
                    "directory_service_account_key": "{\"client_email\":\"sa@a.com\"}",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        admin_key: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = admin_key {
            builder = builder.header("x-admin-api-key", key);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(method, uri, body, Some(TEST_ADMIN_API_KEY)).await
    }

    pub async fn login(&self, body: Value) -> (StatusCode, Value) {
        self.post("/login", body).await
    }

    pub async fn renew(&self, lease: &Value) -> (StatusCode, Value) {
        self.admin(Method::POST, "/renew", Some(json!({ "auth": lease })))
            .await
    }
}
