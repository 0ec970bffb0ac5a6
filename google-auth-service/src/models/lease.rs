//! The authentication lease handed back to the host after login or renewal.

use super::identity::{Group, Identity};
use super::state::FlowType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Host-wide lease bounds, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseLimits {
    pub default_ttl: u64,
    pub max_ttl: u64,
}

impl Default for LeaseLimits {
    fn default() -> Self {
        Self {
            default_ttl: 86_400,
            max_ttl: 2_764_800,
        }
    }
}

/// What a renewal needs to redo verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInternalData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "type")]
    pub flow: FlowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOptions {
    pub ttl: u64,
    pub max_ttl: u64,
    pub renewable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub display_name: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub internal_data: LeaseInternalData,
    pub lease_options: LeaseOptions,
    #[serde(default)]
    pub period: u64,
    pub alias: Alias,
    #[serde(default)]
    pub group_aliases: Vec<Alias>,
}

impl Alias {
    pub fn for_identity(identity: &Identity) -> Self {
        let metadata = BTreeMap::from([
            ("username".to_string(), identity.email.clone()),
            ("domain".to_string(), identity.domain.clone()),
            ("first_name".to_string(), identity.given_name.clone()),
            ("last_name".to_string(), identity.family_name.clone()),
        ]);
        Self {
            name: identity.email.clone(),
            metadata,
        }
    }
}

/// One alias per group plus a trailing `@<domain>` alias.
pub fn group_aliases(identity: &Identity, groups: &[Group]) -> Vec<Alias> {
    groups
        .iter()
        .map(|group| Alias {
            name: group.email.clone(),
            metadata: BTreeMap::from([
                ("name".to_string(), group.name.clone()),
                ("aliases".to_string(), group.aliases.join(",")),
                ("description".to_string(), group.description.clone()),
            ]),
        })
        .chain(std::iter::once(Alias {
            name: format!("@{}", identity.domain),
            metadata: BTreeMap::new(),
        }))
        .collect()
}
