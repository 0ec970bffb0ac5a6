//! The singleton backend configuration record and its field table.

use super::fields::{
    parse_duration_seconds, parse_string_list, parse_text, FieldError, FieldResult,
};
use super::state::FlowType;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const REDACTED: &str = "<redacted>";

pub const USERINFO_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

pub const CLI_REDIRECT_URL: &str = "urn:ietf:wg:oauth:2.0:oob";

const DEFAULT_WEB_BASE_URL: &str = "http://localhost:8200";
const WEB_CALLBACK_PATH: &str = "ui/vault/auth/google/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Integer seconds or a human duration like `"33m"`.
    Duration,
    /// JSON array or comma-separated string.
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub secret: bool,
    pub description: &'static str,
}

const fn field(
    name: &'static str,
    kind: FieldKind,
    secret: bool,
    description: &'static str,
) -> ConfigField {
    ConfigField {
        name,
        kind,
        secret,
        description,
    }
}

pub const CONFIG_FIELDS: &[ConfigField] = &[
    field("cli_client_id", FieldKind::Text, false, "Google OAuth2 client id for the CLI flow"),
    field("cli_client_secret", FieldKind::Text, true, "Google OAuth2 client secret for the CLI flow"),
    field("cli_ttl", FieldKind::Duration, false, "Lease TTL for CLI logins"),
    field("cli_max_ttl", FieldKind::Duration, false, "Maximum lease TTL for CLI logins"),
    field("web_client_id", FieldKind::Text, false, "Google OAuth2 client id for the web flow"),
    field("web_client_secret", FieldKind::Text, true, "Google OAuth2 client secret for the web flow"),
    field("web_redirect_url", FieldKind::Text, false, "Base URL the web flow redirects back to"),
    field("web_ttl", FieldKind::Duration, false, "Lease TTL for web logins"),
    field("web_max_ttl", FieldKind::Duration, false, "Maximum lease TTL for web logins"),
    field(
        "directory_service_account_key",
        FieldKind::Text,
        true,
        "Service account JSON key used to read group memberships",
    ),
    field(
        "directory_impersonate_user",
        FieldKind::Text,
        false,
        "Workspace admin the service account impersonates for directory reads",
    ),
    field("allowed_users", FieldKind::List, false, "Emails allowed to log in"),
    field("allowed_groups", FieldKind::List, false, "Group emails or aliases allowed to log in"),
    field("allowed_domains", FieldKind::List, false, "Hosted domains allowed to log in"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub cli_client_id: String,
    pub cli_client_secret: String,
    pub cli_ttl: u64,
    pub cli_max_ttl: u64,
    pub web_client_id: String,
    pub web_client_secret: String,
    pub web_redirect_url: String,
    pub web_ttl: u64,
    pub web_max_ttl: u64,
    pub directory_service_account_key: String,
    pub directory_impersonate_user: String,
    pub allowed_users: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub allowed_domains: Vec<String>,
}

enum Slot<'a> {
    Text(&'a mut String),
    Duration(&'a mut u64),
    List(&'a mut Vec<String>),
}

#[cfg(test)]
impl Slot<'_> {
    fn kind(&self) -> FieldKind {
        match self {
            Slot::Text(_) => FieldKind::Text,
            Slot::Duration(_) => FieldKind::Duration,
            Slot::List(_) => FieldKind::List,
        }
    }
}

/// Everything needed to talk to Google's OAuth2 endpoints for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub flow: FlowType,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl BackendConfig {
    fn slot_mut(&mut self, name: &str) -> Option<Slot<'_>> {
        let slot = match name {
            "cli_client_id" => Slot::Text(&mut self.cli_client_id),
            "cli_client_secret" => Slot::Text(&mut self.cli_client_secret),
            "cli_ttl" => Slot::Duration(&mut self.cli_ttl),
            "cli_max_ttl" => Slot::Duration(&mut self.cli_max_ttl),
            "web_client_id" => Slot::Text(&mut self.web_client_id),
            "web_client_secret" => Slot::Text(&mut self.web_client_secret),
            "web_redirect_url" => Slot::Text(&mut self.web_redirect_url),
            "web_ttl" => Slot::Duration(&mut self.web_ttl),
            "web_max_ttl" => Slot::Duration(&mut self.web_max_ttl),
            "directory_service_account_key" => Slot::Text(&mut self.directory_service_account_key),
            "directory_impersonate_user" => Slot::Text(&mut self.directory_impersonate_user),
            "allowed_users" => Slot::List(&mut self.allowed_users),
            "allowed_groups" => Slot::List(&mut self.allowed_groups),
            "allowed_domains" => Slot::List(&mut self.allowed_domains),
            _ => return None,
        };
        Some(slot)
    }

    fn value_of(&self, name: &str) -> Value {
        match name {
            "cli_client_id" => Value::from(self.cli_client_id.as_str()),
            "cli_client_secret" => Value::from(self.cli_client_secret.as_str()),
            "cli_ttl" => Value::from(self.cli_ttl),
            "cli_max_ttl" => Value::from(self.cli_max_ttl),
            "web_client_id" => Value::from(self.web_client_id.as_str()),
            "web_client_secret" => Value::from(self.web_client_secret.as_str()),
            "web_redirect_url" => Value::from(self.web_redirect_url.as_str()),
            "web_ttl" => Value::from(self.web_ttl),
            "web_max_ttl" => Value::from(self.web_max_ttl),
            "directory_service_account_key" => {
                Value::from(self.directory_service_account_key.as_str())
            }
            "directory_impersonate_user" => Value::from(self.directory_impersonate_user.as_str()),
            "allowed_users" => Value::from(self.allowed_users.clone()),
            "allowed_groups" => Value::from(self.allowed_groups.clone()),
            "allowed_domains" => Value::from(self.allowed_domains.clone()),
            _ => Value::Null,
        }
    }

    /// Builds the config that results from applying `fields` on top of this
    /// one. Only supplied fields change; unknown fields are ignored. Any
    /// malformed field rejects the whole update.
    pub fn apply(&self, fields: &Map<String, Value>) -> FieldResult<BackendConfig> {
        let mut next = self.clone();
        for field in CONFIG_FIELDS {
            let Some(raw) = fields.get(field.name) else {
                continue;
            };
            match next.slot_mut(field.name) {
                Some(Slot::Text(slot)) => *slot = parse_text(field.name, raw)?,
                Some(Slot::Duration(slot)) => *slot = parse_duration_seconds(field.name, raw)?,
                Some(Slot::List(slot)) => *slot = parse_string_list(field.name, raw)?,
                None => return Err(FieldError::UnknownField(field.name.to_string())),
            }
        }
        Ok(next)
    }

    /// Read view: secrets are `""` when unset and `<redacted>` otherwise.
    pub fn describe(&self) -> Map<String, Value> {
        CONFIG_FIELDS
            .iter()
            .map(|field| {
                let value = self.value_of(field.name);
                let value = match (field.secret, &value) {
                    (true, Value::String(s)) if s.is_empty() => Value::from(""),
                    (true, _) => Value::from(REDACTED),
                    (false, _) => value,
                };
                (field.name.to_string(), value)
            })
            .collect()
    }

    pub fn client_configured(&self, flow: FlowType) -> bool {
        match flow {
            FlowType::Cli => !self.cli_client_id.is_empty() && !self.cli_client_secret.is_empty(),
            FlowType::Web => {
                !self.web_client_id.is_empty()
                    && !self.web_client_secret.is_empty()
                    && !self.web_redirect_url.is_empty()
            }
        }
    }

    /// Group lookups need both the impersonated admin and the service account key.
    pub fn directory_configured(&self) -> bool {
        !self.directory_impersonate_user.is_empty()
            && !self.directory_service_account_key.is_empty()
    }

    /// `(ttl, max_ttl)` in seconds for leases issued through `flow`.
    pub fn ttl_for(&self, flow: FlowType) -> (u64, u64) {
        match flow {
            FlowType::Cli => (self.cli_ttl, self.cli_max_ttl),
            FlowType::Web => (self.web_ttl, self.web_max_ttl),
        }
    }

    pub fn oauth_client(&self, flow: FlowType, mount: &str) -> OAuthClient {
        let scopes = USERINFO_SCOPES.iter().map(|s| s.to_string()).collect();
        match flow {
            FlowType::Cli => OAuthClient {
                flow,
                client_id: self.cli_client_id.clone(),
                client_secret: self.cli_client_secret.clone(),
                redirect_url: CLI_REDIRECT_URL.to_string(),
                scopes,
            },
            FlowType::Web => OAuthClient {
                flow,
                client_id: self.web_client_id.clone(),
                client_secret: self.web_client_secret.clone(),
                redirect_url: web_redirect_url(&self.web_redirect_url, mount),
                scopes,
            },
        }
    }
}

fn web_redirect_url(base: &str, mount: &str) -> String {
    let Ok(mut url) = Url::parse(base).or_else(|_| Url::parse(DEFAULT_WEB_BASE_URL)) else {
        return String::new();
    };

    let base_path = url.path().trim_end_matches('/').to_string();
    let mount = mount.trim_matches('/');
    url.set_path(&format!("{}/{}/{}", base_path, WEB_CALLBACK_PATH, mount));
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_every_table_field_has_a_matching_slot() {
        let mut config = BackendConfig::default();
        for field in CONFIG_FIELDS {
            let slot = config.slot_mut(field.name).expect(field.name);
            assert_eq!(slot.kind(), field.kind, "{}", field.name);
        }
        assert_eq!(CONFIG_FIELDS.len(), 14);
    }

    #[test]
    fn test_apply_is_partial_and_ignores_unknown_fields() {
        let base = BackendConfig {
            cli_client_id: "cli-id".to_string(),
            ..Default::default()
        };
        let next = base
            .apply(&fields(json!({
                "web_client_id": "web-id",
                "web_ttl": "33m",
                "allowed_domains": "a.com,b.com",
                "unrelated": true,
            })))
            .unwrap();

        assert_eq!(next.cli_client_id, "cli-id");
        assert_eq!(next.web_client_id, "web-id");
        assert_eq!(next.web_ttl, 1980);
        assert_eq!(next.allowed_domains, vec!["a.com", "b.com"]);
        assert_ne!(next, base);
        assert_eq!(base.apply(&fields(json!({}))).unwrap(), base);
    }

    #[test]
    fn test_apply_rejects_the_whole_update_on_bad_field() {
        let base = BackendConfig::default();
        let err = base
            .apply(&fields(json!({ "web_client_id": "web-id", "cli_max_ttl": -1 })))
            .unwrap_err();
        assert_eq!(err.to_string(), "cli_max_ttl cannot be negative");
    }

    #[test]
    fn test_describe_redacts_secrets() {
        let config = BackendConfig {
            cli_client_id: "cli-id".to_string(),
            cli_client_secret: "shh".to_string(),
            cli_ttl: 60,
            ..Default::default()
        };
        let described = config.describe();
        assert_eq!(described["cli_client_id"], "cli-id");
        assert_eq!(described["cli_client_secret"], REDACTED);
        assert_eq!(described["web_client_secret"], "");
        assert_eq!(described["directory_service_account_key"], "");
        assert_eq!(described["cli_ttl"], 60);
        assert_eq!(described["allowed_users"], json!([]));
    }

    #[test]
    fn test_web_redirect_url_appends_callback_path() {
        let config = BackendConfig {
            web_redirect_url: "https://example.com/callback".to_string(),
            ..Default::default()
        };
        let client = config.oauth_client(FlowType::Web, "google");
        assert_eq!(
            client.redirect_url,
            "https://example.com/callback/ui/vault/auth/google/callback/google"
        );
    }

    #[test]
    fn test_web_redirect_url_falls_back_to_localhost() {
        let config = BackendConfig::default();
        let client = config.oauth_client(FlowType::Web, "google");
        assert_eq!(
            client.redirect_url,
            "http://localhost:8200/ui/vault/auth/google/callback/google"
        );
    }

    #[test]
    fn test_cli_client_uses_out_of_band_redirect() {
        let config = BackendConfig {
            cli_client_id: "id".to_string(),
            cli_client_secret: "secret".to_string(),
            cli_ttl: 10,
            cli_max_ttl: 20,
            ..Default::default()
        };
        let client = config.oauth_client(FlowType::Cli, "google");
        assert_eq!(client.redirect_url, CLI_REDIRECT_URL);
        assert_eq!(client.scopes.len(), 2);
        assert!(config.client_configured(FlowType::Cli));
        assert!(!config.client_configured(FlowType::Web));
        assert_eq!(config.ttl_for(FlowType::Cli), (10, 20));
    }
}
