use crate::models::LeaseLimits;
use crate::services::AuthorizationMode;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub auth_mode: AuthorizationMode,
    pub mount_path: String,
    pub storage: StorageConfig,
    pub lease: LeaseLimits,
    pub security: SecurityConfig,
    pub google: GoogleEndpointsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: Option<Secret<String>>,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub admin_api_key: Secret<String>,
}

/// Google endpoints, overridable so tests and proxies can stand in.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleEndpointsConfig {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub directory_url: String,
}

impl Default for GoogleEndpointsConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            directory_url: "https://admin.googleapis.com/admin/directory/v1".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let google_defaults = GoogleEndpointsConfig::default();
        let lease_defaults = LeaseLimits::default();

        let storage_backend: StorageBackend = get_env("STORAGE_BACKEND", Some("memory"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("google-auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            auth_mode: get_env("AUTH_MODE", Some("allow_list"), is_prod)?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            mount_path: get_env("MOUNT_PATH", Some("google"), is_prod)?,
            storage: StorageConfig {
                backend: storage_backend,
                redis_url: match storage_backend {
                    StorageBackend::Redis => Some(Secret::new(get_env("REDIS_URL", None, is_prod)?)),
                    StorageBackend::Memory => env::var("REDIS_URL").ok().map(Secret::new),
                },
                key_prefix: get_env("STORAGE_KEY_PREFIX", Some("google-auth:"), is_prod)?,
            },
            lease: LeaseLimits {
                default_ttl: parse_seconds(
                    "DEFAULT_LEASE_TTL_SECONDS",
                    &lease_defaults.default_ttl.to_string(),
                    is_prod,
                )?,
                max_ttl: parse_seconds(
                    "MAX_LEASE_TTL_SECONDS",
                    &lease_defaults.max_ttl.to_string(),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                admin_api_key: Secret::new(get_env("ADMIN_API_KEY", None, true)?),
            },
            google: GoogleEndpointsConfig {
                auth_url: get_env("GOOGLE_AUTH_URL", Some(&google_defaults.auth_url), false)?,
                token_url: get_env("GOOGLE_TOKEN_URL", Some(&google_defaults.token_url), false)?,
                userinfo_url: get_env(
                    "GOOGLE_USERINFO_URL",
                    Some(&google_defaults.userinfo_url),
                    false,
                )?,
                directory_url: get_env(
                    "GOOGLE_DIRECTORY_URL",
                    Some(&google_defaults.directory_url),
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.lease.max_ttl == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_LEASE_TTL_SECONDS must be positive"
            )));
        }

        if self.lease.default_ttl > self.lease.max_ttl {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_LEASE_TTL_SECONDS cannot exceed MAX_LEASE_TTL_SECONDS"
            )));
        }

        if self.storage.backend == StorageBackend::Redis
            && self
                .storage
                .redis_url
                .as_ref()
                .map_or(true, |url| url.expose_secret().is_empty())
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REDIS_URL is required when STORAGE_BACKEND=redis"
            )));
        }

        if self.admin_api_key().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_API_KEY cannot be empty"
            )));
        }

        reqwest::Url::parse(&self.google.auth_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("GOOGLE_AUTH_URL is not a valid URL: {}", e))
        })?;

        // In production, ensure stricter validation
        if self.environment == Environment::Prod && self.storage.backend == StorageBackend::Memory {
            tracing::warn!("In-memory storage in production loses state and roles on restart");
        }

        Ok(())
    }

    pub fn admin_api_key(&self) -> &str {
        self.security.admin_api_key.expose_secret()
    }
}

fn parse_seconds(key: &str, default: &str, is_prod: bool) -> Result<u64, AppError> {
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: std::num::ParseIntError| {
            AppError::ConfigError(anyhow::anyhow!("{} must be a whole number of seconds: {}", key, e))
        })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}
