//! Code URL issuance, login and renewal.
//!
//! Login: consume state (web) -> exchange code -> resolve identity and
//! groups -> authorize -> lease. Renewal replays the last three steps with
//! the token stored in the lease and refuses to change the granted policies.

use crate::models::fields::same_policies;
use crate::models::lease::group_aliases;
use crate::models::{
    Alias, BackendConfig, FlowType, Group, Identity, Lease, LeaseInternalData, LeaseOptions,
    Token,
};
use crate::services::authorization::{self, AuthorizationMode};
use crate::services::config_store::ConfigStore;
use crate::services::error::BackendError;
use crate::services::metrics;
use crate::services::provider::IdentityResolver;
use crate::services::role_store::RoleStore;
use crate::services::state_store::StateStore;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub mode: AuthorizationMode,
    pub mount: String,
    pub auth_url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUrl {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Outcome of authorization: what the lease grants.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Grant {
    policies: Vec<String>,
    ttl: u64,
    max_ttl: u64,
    period: u64,
}

#[derive(Clone)]
pub struct LoginOrchestrator {
    config: ConfigStore,
    states: StateStore,
    roles: RoleStore,
    resolver: IdentityResolver,
    settings: LoginSettings,
}

fn client_label(flow: FlowType) -> &'static str {
    match flow {
        FlowType::Web => "web",
        FlowType::Cli => "CLI",
    }
}

fn outcome(result: &Result<Lease, BackendError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(
            BackendError::NotAllowed
            | BackendError::RoleNotAllowed
            | BackendError::PolicyDrift
            | BackendError::UnverifiedEmail,
        ) => "denied",
        Err(_) => "error",
    }
}

impl LoginOrchestrator {
    pub fn new(
        config: ConfigStore,
        states: StateStore,
        roles: RoleStore,
        resolver: IdentityResolver,
        settings: LoginSettings,
    ) -> Self {
        Self {
            config,
            states,
            roles,
            resolver,
            settings,
        }
    }

    pub fn mode(&self) -> AuthorizationMode {
        self.settings.mode
    }

    /// Issues a state nonce for `flow` and builds Google's consent URL.
    #[tracing::instrument(skip(self))]
    pub async fn code_url(&self, flow: FlowType) -> Result<CodeUrl, BackendError> {
        let config = self.config.read().await?;
        if !config.client_configured(flow) {
            return Err(BackendError::MissingClientConfig(client_label(flow)));
        }
        let client = config.oauth_client(flow, &self.settings.mount);

        let state = self.states.issue(flow).await?;

        let mut url = self.settings.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &client.client_id)
                .append_pair("redirect_uri", &client.redirect_url)
                .append_pair("response_type", "code")
                .append_pair("scope", &client.scopes.join(" "))
                .append_pair("state", &state)
                .append_pair("prompt", "consent");
            if flow == FlowType::Cli {
                query.append_pair("access_type", "offline");
            }
        }

        Ok(CodeUrl {
            url: url.to_string(),
            state,
        })
    }

    #[tracing::instrument(skip_all)]
    pub async fn login(&self, request: LoginRequest) -> Result<Lease, BackendError> {
        let (flow, result) = self.login_inner(request).await;
        metrics::record_login(flow.map(|f| f.as_str()).unwrap_or("unknown"), outcome(&result));
        result
    }

    async fn login_inner(
        &self,
        request: LoginRequest,
    ) -> (Option<FlowType>, Result<Lease, BackendError>) {
        if request.code.is_empty() {
            return (None, Err(BackendError::InvalidRequest("code is required".to_string())));
        }
        let role = request.role.filter(|r| !r.trim().is_empty());
        if self.settings.mode == AuthorizationMode::Role && role.is_none() {
            return (None, Err(BackendError::InvalidRequest("role name is required".to_string())));
        }

        let flow = match request.state.as_deref().filter(|s| !s.is_empty()) {
            Some(nonce) => match self.consume_state(nonce).await {
                Ok(flow) => flow,
                Err(e) => return (None, Err(e)),
            },
            None => FlowType::Cli,
        };

        let result = self.complete_login(flow, &request.code, role).await;
        (Some(flow), result)
    }

    async fn consume_state(&self, nonce: &str) -> Result<FlowType, BackendError> {
        let state = self.states.consume(nonce).await?;
        let swept = self.states.sweep().await?;
        metrics::record_swept(swept);
        Ok(state.flow)
    }

    async fn complete_login(
        &self,
        flow: FlowType,
        code: &str,
        role: Option<String>,
    ) -> Result<Lease, BackendError> {
        let config = self.config.read().await?;
        if !config.client_configured(flow) {
            return Err(BackendError::MissingClientConfig(client_label(flow)));
        }
        let client = config.oauth_client(flow, &self.settings.mount);

        let token = self.resolver.exchange(&client, code).await?;
        let (identity, token) = self.resolver.resolve_user(&client, token).await?;
        let groups = self.resolver.resolve_groups(&config, &identity.email).await?;

        // Only role mode checks the role, so only role mode records it.
        let role = role
            .filter(|_| self.settings.mode == AuthorizationMode::Role)
            .map(|r| r.trim().to_lowercase());
        let grant = self
            .authorize(&config, flow, role.as_deref(), &identity, &groups)
            .await?;

        tracing::info!(
            email = %identity.email,
            domain = %identity.domain,
            flow = %flow,
            role = role.as_deref().unwrap_or("-"),
            "Login succeeded"
        );

        let mut metadata = BTreeMap::from([
            ("username".to_string(), identity.email.clone()),
            ("domain".to_string(), identity.domain.clone()),
        ]);
        if let Some(role) = &role {
            metadata.insert("role".to_string(), role.clone());
        }

        Ok(Lease {
            display_name: identity.email.clone(),
            policies: grant.policies,
            metadata,
            internal_data: LeaseInternalData {
                token: Some(token.encode()?),
                flow,
                role,
            },
            lease_options: LeaseOptions {
                ttl: grant.ttl,
                max_ttl: grant.max_ttl,
                renewable: true,
            },
            period: grant.period,
            alias: Alias::for_identity(&identity),
            group_aliases: group_aliases(&identity, &groups),
        })
    }

    /// Re-verifies the lease holder and extends the lease.
    #[tracing::instrument(skip_all, fields(user = %lease.display_name))]
    pub async fn renew(&self, lease: Lease) -> Result<Lease, BackendError> {
        let result = self.renew_inner(lease).await;
        metrics::record_renewal(outcome(&result));
        result
    }

    async fn renew_inner(&self, lease: Lease) -> Result<Lease, BackendError> {
        let encoded = lease
            .internal_data
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(BackendError::MissingToken)?;
        let token = Token::decode(encoded)?;

        let config = self.config.read().await?;
        let flow = lease.internal_data.flow;
        let client = config.oauth_client(flow, &self.settings.mount);

        let (identity, token) = self.resolver.resolve_user(&client, token).await?;
        let groups = self.resolver.resolve_groups(&config, &identity.email).await?;

        let role = lease.internal_data.role.clone();
        let grant = self
            .authorize(&config, flow, role.as_deref(), &identity, &groups)
            .await?;

        if self.settings.mode.pins_policies() && !same_policies(&grant.policies, &lease.policies) {
            tracing::warn!(
                email = %identity.email,
                granted = ?lease.policies,
                current = ?grant.policies,
                "Refusing renewal, policies changed"
            );
            return Err(BackendError::PolicyDrift);
        }

        tracing::info!(email = %identity.email, flow = %flow, "Lease renewed");

        Ok(Lease {
            internal_data: LeaseInternalData {
                token: Some(token.encode()?),
                ..lease.internal_data
            },
            lease_options: LeaseOptions {
                ttl: grant.ttl,
                max_ttl: grant.max_ttl,
                renewable: true,
            },
            period: grant.period,
            group_aliases: group_aliases(&identity, &groups),
            ..lease
        })
    }

    async fn authorize(
        &self,
        config: &BackendConfig,
        flow: FlowType,
        role_name: Option<&str>,
        identity: &Identity,
        groups: &[Group],
    ) -> Result<Grant, BackendError> {
        let (flow_ttl, flow_max_ttl) = config.ttl_for(flow);

        match self.settings.mode {
            AuthorizationMode::AllowList => {
                authorization::check_allow_list(config, identity, groups)?;
                Ok(Grant {
                    policies: Vec::new(),
                    ttl: flow_ttl,
                    max_ttl: flow_max_ttl,
                    period: 0,
                })
            }
            AuthorizationMode::Role => {
                let name = role_name.ok_or_else(|| {
                    BackendError::InvalidRequest("role name is required".to_string())
                })?;
                let Some(role) = self.roles.role(name).await? else {
                    tracing::info!(
                        email = %identity.email,
                        role = %name,
                        "Login denied, role does not exist"
                    );
                    return Err(BackendError::RoleNotAllowed);
                };
                let policies = authorization::check_role(name, &role, identity, groups)?;
                Ok(Grant {
                    policies,
                    ttl: role.ttl,
                    max_ttl: role.max_ttl,
                    period: role.period,
                })
            }
            AuthorizationMode::LegacyUsers => {
                let mapping = self.roles.user(identity.local_part()).await?;
                let policies =
                    authorization::check_user_map(config, identity, groups, mapping.as_ref())?;
                Ok(Grant {
                    policies,
                    ttl: flow_ttl,
                    max_ttl: flow_max_ttl,
                    period: 0,
                })
            }
        }
    }
}
