//! Authorization decisions for a resolved identity and its groups.
//!
//! Three interchangeable modes, picked per deployment:
//! - allow-list: domain, user or group allow-lists from the backend config
//! - role: a named role binds a domain plus groups/emails to policies
//! - legacy users: allow-list first, then a per-user policy map

use crate::models::{BackendConfig, Group, Identity, Role, UserPolicies};
use crate::services::error::BackendError;
use crate::models::fields::sanitize_policies;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    AllowList,
    Role,
    LegacyUsers,
}

impl AuthorizationMode {
    /// Whether renewals must reproduce the exact policy set granted at login.
    pub fn pins_policies(&self) -> bool {
        !matches!(self, AuthorizationMode::AllowList)
    }
}

impl FromStr for AuthorizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow_list" | "allowlist" => Ok(AuthorizationMode::AllowList),
            "role" | "roles" => Ok(AuthorizationMode::Role),
            "legacy_users" | "users" => Ok(AuthorizationMode::LegacyUsers),
            _ => Err(format!("Invalid authorization mode: {}", s)),
        }
    }
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|item| item.eq_ignore_ascii_case(needle))
}

fn in_any_group(groups: &[Group], allowed: &[String]) -> bool {
    groups
        .iter()
        .flat_map(Group::identifiers)
        .any(|id| contains_ignore_case(allowed, id))
}

/// Allow-list mode. With no lists configured everyone is admitted.
pub fn check_allow_list(
    config: &BackendConfig,
    identity: &Identity,
    groups: &[Group],
) -> Result<(), BackendError> {
    if config.allowed_domains.is_empty()
        && config.allowed_users.is_empty()
        && config.allowed_groups.is_empty()
    {
        return Ok(());
    }

    let allowed = contains_ignore_case(&config.allowed_domains, &identity.domain)
        || contains_ignore_case(&config.allowed_users, &identity.email)
        || in_any_group(groups, &config.allowed_groups);

    if allowed {
        Ok(())
    } else {
        tracing::info!(email = %identity.email, domain = %identity.domain, "Login denied by allow-list");
        Err(BackendError::NotAllowed)
    }
}

/// Role mode. The domain must match exactly; emails and groups are compared
/// case-insensitively. Returns the role's policies.
pub fn check_role(
    role_name: &str,
    role: &Role,
    identity: &Identity,
    groups: &[Group],
) -> Result<Vec<String>, BackendError> {
    let domain_ok = !identity.domain.is_empty() && identity.domain == role.bound_domain;
    let member_ok = contains_ignore_case(&role.bound_emails, &identity.email)
        || in_any_group(groups, &role.bound_groups);

    if domain_ok && member_ok {
        Ok(role.policies.clone())
    } else {
        tracing::info!(email = %identity.email, role = %role_name, "Login denied by role bindings");
        Err(BackendError::RoleNotAllowed)
    }
}

/// Legacy user-map mode. Unmapped users are denied.
pub fn check_user_map(
    config: &BackendConfig,
    identity: &Identity,
    groups: &[Group],
    mapping: Option<&UserPolicies>,
) -> Result<Vec<String>, BackendError> {
    check_allow_list(config, identity, groups)?;

    match mapping {
        Some(mapping) => Ok(sanitize_policies(mapping.policies.clone())),
        None => {
            tracing::info!(email = %identity.email, "Login denied, no policy mapping for user");
            Err(BackendError::NotAllowed)
        }
    }
}
