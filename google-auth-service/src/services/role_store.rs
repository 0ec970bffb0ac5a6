//! CRUD for `role/<name>` and the legacy `users/<name>` policy map.

use crate::models::fields::{parse_string_list, sanitize_policies};
use crate::models::{LeaseLimits, Role, UserPolicies};
use crate::services::error::BackendError;
use crate::services::storage::{get_json, put_json, Storage};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const ROLE_PREFIX: &str = "role/";
pub const USERS_PREFIX: &str = "users/";

/// Result of a role create/update.
#[derive(Debug, Clone)]
pub struct RoleWrite {
    pub name: String,
    pub role: Role,
    pub created: bool,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct RoleStore {
    storage: Arc<dyn Storage>,
}

fn normalize_name(name: &str, what: &str) -> Result<String, BackendError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(BackendError::InvalidRequest(format!("{} name is required", what)));
    }
    Ok(name)
}

impl RoleStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn role(&self, name: &str) -> Result<Option<Role>, BackendError> {
        let name = normalize_name(name, "role")?;
        get_json(self.storage.as_ref(), &format!("{}{}", ROLE_PREFIX, name)).await
    }

    /// Creates the role or updates the supplied fields of an existing one.
    /// The result is validated before anything is stored.
    #[tracing::instrument(skip(self, fields, limits))]
    pub async fn write_role(
        &self,
        name: &str,
        fields: &Map<String, Value>,
        limits: &LeaseLimits,
    ) -> Result<RoleWrite, BackendError> {
        let name = normalize_name(name, "role")?;
        let existing = self.role(&name).await?;
        let created = existing.is_none();

        let role = existing.unwrap_or_default().apply(fields)?;
        let warnings = role.validate(limits)?;

        put_json(self.storage.as_ref(), &format!("{}{}", ROLE_PREFIX, name), &role).await?;
        tracing::info!(role = %name, created, "Role saved");

        Ok(RoleWrite {
            name,
            role,
            created,
            warnings,
        })
    }

    pub async fn delete_role(&self, name: &str) -> Result<(), BackendError> {
        let name = normalize_name(name, "role")?;
        self.storage
            .delete(&format!("{}{}", ROLE_PREFIX, name))
            .await
            .map_err(BackendError::Storage)?;
        tracing::info!(role = %name, "Role deleted");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<String>, BackendError> {
        self.storage
            .list(ROLE_PREFIX)
            .await
            .map_err(BackendError::Storage)
    }

    // ------------------------------------------------------------------------
    // Legacy user map
    // ------------------------------------------------------------------------

    pub async fn user(&self, name: &str) -> Result<Option<UserPolicies>, BackendError> {
        let name = normalize_name(name, "user")?;
        get_json(self.storage.as_ref(), &format!("{}{}", USERS_PREFIX, name)).await
    }

    pub async fn write_user(
        &self,
        name: &str,
        fields: &Map<String, Value>,
    ) -> Result<UserPolicies, BackendError> {
        let name = normalize_name(name, "user")?;
        let raw = fields.get("policies").cloned().unwrap_or(Value::Null);
        let policies = parse_string_list("policies", &raw)?;
        let entry = UserPolicies {
            policies: sanitize_policies(policies),
        };

        put_json(self.storage.as_ref(), &format!("{}{}", USERS_PREFIX, name), &entry).await?;
        tracing::info!(user = %name, "User policy mapping saved");
        Ok(entry)
    }

    pub async fn delete_user(&self, name: &str) -> Result<(), BackendError> {
        let name = normalize_name(name, "user")?;
        self.storage
            .delete(&format!("{}{}", USERS_PREFIX, name))
            .await
            .map_err(BackendError::Storage)
    }

    pub async fn list_users(&self) -> Result<Vec<String>, BackendError> {
        self.storage
            .list(USERS_PREFIX)
            .await
            .map_err(BackendError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryStorage;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn store() -> RoleStore {
        RoleStore::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_role_names_are_lowercased() {
        let store = store();
        let written = store
            .write_role(
                "DevOps",
                &fields(json!({ "bound_domain": "a.com", "policies": "ops" })),
                &LeaseLimits::default(),
            )
            .await
            .unwrap();
        assert_eq!(written.name, "devops");
        assert!(written.created);

        assert!(store.role("devops").await.unwrap().is_some());
        assert_eq!(store.list_roles().await.unwrap(), vec!["devops"]);
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let store = store();
        let limits = LeaseLimits::default();
        store
            .write_role("dev", &fields(json!({ "bound_domain": "a.com", "policies": ["dev"] })), &limits)
            .await
            .unwrap();

        let updated = store
            .write_role("dev", &fields(json!({ "ttl": 60 })), &limits)
            .await
            .unwrap();
        assert!(!updated.created);
        assert_eq!(updated.role.policies, vec!["dev"]);
        assert_eq!(updated.role.ttl, 60);
    }

    #[tokio::test]
    async fn test_invalid_role_is_not_stored() {
        let store = store();
        let err = store
            .write_role("dev", &fields(json!({ "policies": ["dev"] })), &LeaseLimits::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bound domain cannot be empty");
        assert!(store.role("dev").await.unwrap().is_none());

        let err = store
            .write_role(" ", &fields(json!({})), &LeaseLimits::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "role name is required");
    }

    #[tokio::test]
    async fn test_delete_role() {
        let store = store();
        store
            .write_role("dev", &fields(json!({ "bound_domain": "a.com" })), &LeaseLimits::default())
            .await
            .unwrap();
        store.delete_role("dev").await.unwrap();
        assert!(store.role("dev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_map_crud() {
        let store = store();
        let entry = store
            .write_user("jane", &fields(json!({ "policies": "Dev, ops" })))
            .await
            .unwrap();
        assert_eq!(entry.policies, vec!["dev", "ops"]);
        assert_eq!(store.list_users().await.unwrap(), vec!["jane"]);

        store.delete_user("jane").await.unwrap();
        assert!(store.user("jane").await.unwrap().is_none());
    }
}
