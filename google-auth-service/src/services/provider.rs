//! Seams to Google: the OAuth2/userinfo side and the directory side.
//!
//! `GoogleProvider` (see `google.rs`) implements both for real. The mocks
//! here back the unit and integration tests.

use crate::models::{BackendConfig, FlowType, Group, Identity, OAuthClient, Token};
use crate::services::error::BackendError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse {
        endpoint: &'static str,
        message: String,
    },

    #[error("invalid service account key: {0}")]
    ServiceAccountKey(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    /// Authorization-code exchange at the token endpoint.
    async fn exchange_code(&self, client: &OAuthClient, code: &str)
        -> Result<Token, ProviderError>;

    /// Trades the refresh token for a fresh access token.
    async fn refresh(&self, client: &OAuthClient, token: &Token) -> Result<Token, ProviderError>;

    async fn user_info(&self, token: &Token) -> Result<Identity, ProviderError>;
}

#[async_trait]
pub trait GroupsProvider: Send + Sync {
    /// Every group `user_key` belongs to, across all result pages.
    async fn groups_for_user(
        &self,
        config: &BackendConfig,
        user_key: &str,
    ) -> Result<Vec<Group>, ProviderError>;
}

// ============================================================================
// Identity resolution
// ============================================================================

#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserProvider>,
    groups: Arc<dyn GroupsProvider>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserProvider>, groups: Arc<dyn GroupsProvider>) -> Self {
        Self { users, groups }
    }

    #[tracing::instrument(skip(self, client, code), fields(flow = %client.flow))]
    pub async fn exchange(&self, client: &OAuthClient, code: &str) -> Result<Token, BackendError> {
        Ok(self.users.exchange_code(client, code).await?)
    }

    /// Looks up the user behind `token`, refreshing it first when it has
    /// expired. Returns the token actually used.
    #[tracing::instrument(skip_all, fields(flow = %client.flow))]
    pub async fn resolve_user(
        &self,
        client: &OAuthClient,
        token: Token,
    ) -> Result<(Identity, Token), BackendError> {
        let token = if token.is_expired(Utc::now()) && token.can_refresh() {
            tracing::debug!("Access token expired, refreshing");
            self.users.refresh(client, &token).await?
        } else {
            token
        };

        let identity = self.users.user_info(&token).await?;
        if !identity.verified_email {
            tracing::warn!(email = %identity.email, "Rejecting unverified email");
            return Err(BackendError::UnverifiedEmail);
        }
        Ok((identity, token))
    }

    /// Empty when no directory credentials are configured.
    #[tracing::instrument(skip(self, config))]
    pub async fn resolve_groups(
        &self,
        config: &BackendConfig,
        email: &str,
    ) -> Result<Vec<Group>, BackendError> {
        if !config.directory_configured() {
            return Ok(Vec::new());
        }
        let groups = self.groups.groups_for_user(config, email).await?;
        tracing::debug!(count = groups.len(), "Resolved group memberships");
        Ok(groups)
    }
}

// ============================================================================
// Test doubles
// ============================================================================

const MOCK_ACCESS_PREFIX: &str = "mock-access-";

/// Hands out tokens for registered codes and answers userinfo for them.
#[derive(Default)]
pub struct MockUserProvider {
    pub identities: Mutex<HashMap<String, Identity>>,
    pub exchanges: Mutex<Vec<(FlowType, String)>>,
    pub refreshes: Mutex<usize>,
}

impl MockUserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the identity a code resolves to.
    pub fn register(&self, code: &str, identity: Identity) {
        if let Ok(mut identities) = self.identities.lock() {
            identities.insert(code.to_string(), identity);
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn last_exchange_flow(&self) -> Option<FlowType> {
        self.exchanges
            .lock()
            .ok()
            .and_then(|e| e.last().map(|(flow, _)| *flow))
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().map(|r| *r).unwrap_or_default()
    }
}

#[async_trait]
impl UserProvider for MockUserProvider {
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
    ) -> Result<Token, ProviderError> {
        self.exchanges
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?
            .push((client.flow, code.to_string()));

        let known = self
            .identities
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?
            .contains_key(code);
        if !known {
            return Err(ProviderError::Status {
                endpoint: "token",
                status: 400,
                body: "invalid_grant".to_string(),
            });
        }

        Ok(Token {
            access_token: format!("{}{}", MOCK_ACCESS_PREFIX, code),
            token_type: "Bearer".to_string(),
            refresh_token: format!("mock-refresh-{}", code),
            expiry: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh(&self, _client: &OAuthClient, token: &Token) -> Result<Token, ProviderError> {
        *self
            .refreshes
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))? += 1;

        Ok(Token {
            expiry: Some(Utc::now() + Duration::hours(1)),
            ..token.clone()
        })
    }

    async fn user_info(&self, token: &Token) -> Result<Identity, ProviderError> {
        let code = token
            .access_token
            .strip_prefix(MOCK_ACCESS_PREFIX)
            .unwrap_or_default();
        self.identities
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?
            .get(code)
            .cloned()
            .ok_or(ProviderError::Status {
                endpoint: "userinfo",
                status: 401,
                body: "invalid_token".to_string(),
            })
    }
}

/// Static group memberships keyed by user email.
#[derive(Default)]
pub struct MockGroupsProvider {
    pub memberships: Mutex<HashMap<String, Vec<Group>>>,
    pub lookups: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl MockGroupsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_groups(&self, email: &str, groups: Vec<Group>) {
        if let Ok(mut memberships) = self.memberships.lock() {
            memberships.insert(email.to_string(), groups);
        }
    }

    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().map(|l| l.len()).unwrap_or_default()
    }
}

#[async_trait]
impl GroupsProvider for MockGroupsProvider {
    async fn groups_for_user(
        &self,
        _config: &BackendConfig,
        user_key: &str,
    ) -> Result<Vec<Group>, ProviderError> {
        self.lookups
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?
            .push(user_key.to_string());

        let fail = *self
            .fail
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?;
        if fail {
            return Err(ProviderError::Status {
                endpoint: "directory",
                status: 503,
                body: "backend error".to_string(),
            });
        }

        Ok(self
            .memberships
            .lock()
            .map_err(|e| ProviderError::Unavailable(format!("Mock mutex poisoned: {}", e)))?
            .get(user_key)
            .cloned()
            .unwrap_or_default())
    }
}
