//! Persistent per-item outcome records.
//!
//! One store entry per item key under `progress:<job>`. A present record marks
//! its key as committed regardless of status.

use crate::error::Result;
use crate::store::DurableStore;
use crate::types::{ItemKey, OutcomeRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// Namespace prefix for progress records; the job name is appended
pub const PROGRESS_NAMESPACE: &str = "progress";

/// Typed facade over the outcome records of one job
#[derive(Clone)]
pub struct ProgressStore {
    store: Arc<dyn DurableStore>,
    namespace: String,
}

impl ProgressStore {
    /// Create a progress store handle for `job`
    pub fn new(store: Arc<dyn DurableStore>, job: &str) -> Self {
        Self {
            store,
            namespace: format!("{PROGRESS_NAMESPACE}:{job}"),
        }
    }

    /// Outcome record for `key`, if committed
    pub async fn get(&self, key: &ItemKey) -> Result<Option<OutcomeRecord>> {
        match self.store.get(&self.namespace, key.as_str()).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every committed record
    pub async fn get_all(&self) -> Result<HashMap<ItemKey, OutcomeRecord>> {
        self.store
            .entries(&self.namespace)
            .await?
            .into_iter()
            .map(|(key, raw)| Ok((ItemKey(key), serde_json::from_str(&raw)?)))
            .collect()
    }

    /// Insert or overwrite the record for `key`
    pub async fn commit(&self, key: &ItemKey, record: &OutcomeRecord) -> Result<()> {
        let encoded = serde_json::to_string(record)?;
        self.store.set(&self.namespace, key.as_str(), &encoded).await
    }

    /// Delete the record for `key`, making it pending again
    pub async fn remove(&self, key: &ItemKey) -> Result<()> {
        self.store.remove(&self.namespace, key.as_str()).await
    }

    /// Delete every record of this job
    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.namespace).await
    }
}
