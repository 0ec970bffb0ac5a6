//! OAuth2 token as carried inside a lease.
//!
//! The encoded form is opaque to the host: it is stored in the lease's
//! internal data at login and decoded again on every renewal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens are treated as expired slightly before Google says so, so a
/// refresh happens before a request can race the real expiry.
const EXPIRY_LEEWAY_SECONDS: i64 = 10;

#[derive(Debug, Error)]
#[error("malformed token: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(encoded: &str) -> Result<Self, DecodeError> {
        let token: Token = serde_json::from_str(encoded)?;
        Ok(token)
    }

    /// A token without a known expiry never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_LEEWAY_SECONDS) <= now,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}
