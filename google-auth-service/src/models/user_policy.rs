use serde::{Deserialize, Serialize};

/// Legacy per-user policy mapping, stored under `users/<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPolicies {
    #[serde(default)]
    pub policies: Vec<String>,
}
