use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which OAuth2 client a login went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// Browser redirect flow, protected by a single-use state nonce.
    Web,
    /// Copy-paste flow for terminals, no state involved.
    Cli,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Web => "web",
            FlowType::Cli => "cli",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" => Ok(FlowType::Web),
            "cli" => Ok(FlowType::Cli),
            _ => Err(format!("Invalid flow type: {}", s)),
        }
    }
}

/// Persisted under `state/<nonce>` between code URL issuance and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    #[serde(rename = "type")]
    pub flow: FlowType,
    pub created: DateTime<Utc>,
}

impl LoginState {
    pub fn new(flow: FlowType) -> Self {
        Self {
            flow,
            created: Utc::now(),
        }
    }

    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.created < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_state_wire_format() {
        let state = LoginState::new(FlowType::Web);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "web");
        assert!(json["created"].is_string());
    }

    #[test]
    fn test_flow_type_parsing() {
        assert_eq!("CLI".parse::<FlowType>().unwrap(), FlowType::Cli);
        assert_eq!("web".parse::<FlowType>().unwrap(), FlowType::Web);
        assert!("device".parse::<FlowType>().is_err());
    }
}
