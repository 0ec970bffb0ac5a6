use crate::models::BackendConfig;
use crate::services::error::BackendError;
use crate::services::storage::{get_json, put_json, Storage};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const CONFIG_KEY: &str = "config";

/// Owner of the singleton `config` record.
#[derive(Clone)]
pub struct ConfigStore {
    storage: Arc<dyn Storage>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The zero config when nothing has been written yet.
    pub async fn read(&self) -> Result<BackendConfig, BackendError> {
        Ok(get_json(self.storage.as_ref(), CONFIG_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Applies a partial update. Returns whether anything changed; an
    /// unchanged config is not written back.
    #[tracing::instrument(skip_all)]
    pub async fn write(&self, fields: &Map<String, Value>) -> Result<bool, BackendError> {
        let current = self.read().await?;
        let next = current.apply(fields)?;

        if next == current {
            tracing::debug!("Config unchanged, skipping write");
            return Ok(false);
        }

        put_json(self.storage.as_ref(), CONFIG_KEY, &next).await?;
        tracing::info!("Config updated");
        Ok(true)
    }

    pub async fn describe(&self) -> Result<Map<String, Value>, BackendError> {
        Ok(self.read().await?.describe())
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

    #[tokio::test]
    async fn test_read_defaults_when_unconfigured() {
        let store = ConfigStore::new(Arc::new(MemoryStorage::new()));
        assert_eq!(store.read().await.unwrap(), BackendConfig::default());
    }

    #[tokio::test]
    async fn test_write_reports_changes() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConfigStore::new(storage.clone());

        let update = fields(json!({ "cli_client_id": "id", "cli_client_secret": "secret" }));
        assert!(store.write(&update).await.unwrap());
        assert!(!store.write(&update).await.unwrap());

        let described = store.describe().await.unwrap();
        assert_eq!(described["cli_client_id"], "id");
        assert_eq!(described["cli_client_secret"], "<redacted>");
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_write_stores_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConfigStore::new(storage.clone());

        let err = store
            .write(&fields(json!({ "cli_client_id": "id", "web_ttl": "forever" })))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidField(_)));
        assert!(storage.is_empty());
    }
}
