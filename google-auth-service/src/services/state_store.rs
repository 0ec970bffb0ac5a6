//! Single-use login state for the browser redirect flow.

use crate::models::{FlowType, LoginState};
use crate::services::error::BackendError;
use crate::services::storage::{put_json, Storage};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{Duration, Utc};
use rand::RngCore;
use std::sync::Arc;

pub const STATE_PREFIX: &str = "state/";
const NONCE_BYTES: usize = 16;
const RETENTION_HOURS: i64 = 24;

#[derive(Clone)]
pub struct StateStore {
    storage: Arc<dyn Storage>,
}

fn state_key(nonce: &str) -> String {
    format!("{}{}", STATE_PREFIX, nonce)
}

impl StateStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, flow: FlowType) -> Result<String, BackendError> {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = URL_SAFE.encode(bytes);

        put_json(self.storage.as_ref(), &state_key(&nonce), &LoginState::new(flow)).await?;
        Ok(nonce)
    }

    /// Reads and deletes the state in one step. A nonce can be consumed once.
    #[tracing::instrument(skip_all)]
    pub async fn consume(&self, nonce: &str) -> Result<LoginState, BackendError> {
        let raw = self
            .storage
            .take(&state_key(nonce))
            .await
            .map_err(BackendError::Storage)?
            .ok_or(BackendError::StateNotFound)?;

        let state: LoginState = serde_json::from_str(&raw)?;
        tracing::debug!(flow = %state.flow, "Consumed login state");
        Ok(state)
    }

    /// Removes every state older than the retention window. Returns the
    /// number of entries removed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<usize, BackendError> {
        let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
        let nonces = self
            .storage
            .list(STATE_PREFIX)
            .await
            .map_err(BackendError::Storage)?;

        let mut removed = 0;
        for nonce in nonces {
            let key = state_key(&nonce);
            let Some(raw) = self.storage.get(&key).await.map_err(BackendError::Storage)? else {
                continue;
            };

            let expired = match serde_json::from_str::<LoginState>(&raw) {
                Ok(state) => state.is_older_than(cutoff),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unreadable login state");
                    true
                }
            };
            if expired {
                self.storage
                    .delete(&key)
                    .await
                    .map_err(BackendError::Storage)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Swept expired login states");
        }
        Ok(removed)
    }
}
