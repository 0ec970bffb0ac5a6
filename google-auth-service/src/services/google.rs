//! Google implementation of the provider seams over reqwest.

use crate::config::GoogleEndpointsConfig;
use crate::models::{BackendConfig, Group, Identity, OAuthClient, Token};
use crate::services::provider::{GroupsProvider, ProviderError, UserProvider};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const DIRECTORY_SCOPES: &str = "https://www.googleapis.com/auth/admin.directory.user.readonly https://www.googleapis.com/auth/admin.directory.group.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_SERVICE_ACCOUNT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

#[derive(Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    endpoints: GoogleEndpointsConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<&str>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string))
                .unwrap_or_default(),
            // An out-of-range lifetime is treated as no expiry.
            expiry: self
                .expires_in
                .and_then(Duration::try_seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupsPage {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl GoogleProvider {
    pub fn new(endpoints: GoogleEndpointsConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, endpoints })
    }

    async fn post_token_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, ProviderError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                endpoint: "token",
                source,
            })?;
        read_json("token", response).await
    }

    /// Access token for the directory API, obtained by signing a JWT
    /// assertion as the service account on behalf of the impersonated admin.
    async fn directory_token(&self, config: &BackendConfig) -> Result<String, ProviderError> {
        let key: ServiceAccountKey = serde_json::from_str(&config.directory_service_account_key)
            .map_err(|e| ProviderError::ServiceAccountKey(e.to_string()))?;
        let token_uri = key
            .token_uri
            .as_deref()
            .unwrap_or(DEFAULT_SERVICE_ACCOUNT_TOKEN_URI);

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            sub: &config.directory_impersonate_user,
            scope: DIRECTORY_SCOPES,
            aud: token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECONDS,
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| ProviderError::ServiceAccountKey(e.to_string()))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| ProviderError::ServiceAccountKey(e.to_string()))?;

        let response = self
            .post_token_form(
                token_uri,
                &[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)],
            )
            .await?;
        Ok(response.access_token)
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse {
            endpoint,
            message: e.to_string(),
        })
}

#[async_trait]
impl UserProvider for GoogleProvider {
    #[tracing::instrument(skip_all, fields(flow = %client.flow))]
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
    ) -> Result<Token, ProviderError> {
        let response = self
            .post_token_form(
                &self.endpoints.token_url,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("client_id", &client.client_id),
                    ("client_secret", &client.client_secret),
                    ("redirect_uri", &client.redirect_url),
                ],
            )
            .await?;
        Ok(response.into_token(None))
    }

    #[tracing::instrument(skip_all, fields(flow = %client.flow))]
    async fn refresh(&self, client: &OAuthClient, token: &Token) -> Result<Token, ProviderError> {
        let response = self
            .post_token_form(
                &self.endpoints.token_url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", &token.refresh_token),
                    ("client_id", &client.client_id),
                    ("client_secret", &client.client_secret),
                ],
            )
            .await?;
        Ok(response.into_token(Some(&token.refresh_token)))
    }

    #[tracing::instrument(skip_all)]
    async fn user_info(&self, token: &Token) -> Result<Identity, ProviderError> {
        let response = self
            .client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                endpoint: "userinfo",
                source,
            })?;
        read_json("userinfo", response).await
    }
}

#[async_trait]
impl GroupsProvider for GoogleProvider {
    #[tracing::instrument(skip(self, config))]
    async fn groups_for_user(
        &self,
        config: &BackendConfig,
        user_key: &str,
    ) -> Result<Vec<Group>, ProviderError> {
        let access_token = self.directory_token(config).await?;
        let url = format!("{}/groups", self.endpoints.directory_url.trim_end_matches('/'));

        let mut groups = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("userKey", user_key.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&access_token)
                .query(&query)
                .send()
                .await
                .map_err(|source| ProviderError::Transport {
                    endpoint: "directory",
                    source,
                })?;
            let page: GroupsPage = read_json("directory", response).await?;
            groups.extend(page.groups);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(groups)
    }
}
