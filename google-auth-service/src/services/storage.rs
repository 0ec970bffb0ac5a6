//! Key/value storage the backend persists into.
//!
//! Keys are `/`-separated paths (`config`, `role/<name>`, `state/<nonce>`,
//! `users/<name>`). Every operation is atomic per key; `take` is the
//! read-and-delete primitive single-use state relies on.

use super::error::BackendError;
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::{aio::ConnectionManager, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn put(&self, key: &str, value: String) -> Result<(), anyhow::Error>;
    async fn delete(&self, key: &str) -> Result<(), anyhow::Error>;
    /// Atomically reads and removes `key`. Of several concurrent callers at
    /// most one sees the value.
    async fn take(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    /// Lists the entries directly under `prefix`, returning the remainder of
    /// each key. Nested entries are collapsed to `child/`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, BackendError> {
    match storage.get(key).await.map_err(BackendError::Storage)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), BackendError> {
    let raw = serde_json::to_string(value)?;
    storage.put(key, raw).await.map_err(BackendError::Storage)
}

fn collapse_children<'a>(suffixes: impl Iterator<Item = &'a str>) -> Vec<String> {
    let keys: BTreeSet<String> = suffixes
        .filter(|s| !s.is_empty())
        .map(|suffix| match suffix.find('/') {
            Some(idx) => suffix[..=idx].to_string(),
            None => suffix.to_string(),
        })
        .collect();
    keys.into_iter().collect()
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local storage for development and tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), anyhow::Error> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self.entries.write().remove(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error> {
        let entries = self.entries.read();
        let suffixes = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| &key[prefix.len()..]);
        Ok(collapse_children(suffixes))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

// ============================================================================
// Redis backend
// ============================================================================

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisStorage {
    _client: Client,
    manager: ConnectionManager,
    namespace: String,
}

impl RedisStorage {
    pub async fn new(url: &str, namespace: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(namespace = %namespace, "Connecting to Redis");
        let client = Client::open(url)?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

/// Escapes glob metacharacters so a key prefix matches literally in SCAN.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Storage for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", key, e))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete {}: {}", key, e))?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GETDEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to take {}: {}", key, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let full_prefix = self.key(prefix);
        let pattern = format!("{}*", escape_glob(&full_prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to list {}: {}", prefix, e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(collapse_children(
            keys.iter()
                .filter_map(|key| key.strip_prefix(full_prefix.as_str())),
        ))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_take_returns_value_once() {
        let storage = MemoryStorage::new();
        storage.put("state/abc", "v".to_string()).await.unwrap();

        assert_eq!(storage.take("state/abc").await.unwrap().as_deref(), Some("v"));
        assert_eq!(storage.take("state/abc").await.unwrap(), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_direct_children() {
        let storage = MemoryStorage::new();
        for key in ["role/admin", "role/dev", "role/team/ops", "rolex", "state/n1"] {
            storage.put(key, "{}".to_string()).await.unwrap();
        }

        assert_eq!(
            storage.list("role/").await.unwrap(),
            vec!["admin", "dev", "team/"]
        );
        assert!(storage.list("users/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let storage = MemoryStorage::new();
        put_json(&storage, "users/jane", &json!({ "policies": ["dev"] }))
            .await
            .unwrap();

        let value: Option<serde_json::Value> = get_json(&storage, "users/jane").await.unwrap();
        assert_eq!(value.unwrap()["policies"][0], "dev");

        let missing: Option<serde_json::Value> = get_json(&storage, "users/bob").await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("gas:role/"), "gas:role/");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }
}
