//! Durable key-value store abstraction.
//!
//! The pipeline only ever talks to storage through [`DurableStore`]. Values are
//! opaque strings grouped by namespace; the typed repositories
//! ([`WorkSet`](crate::work_set::WorkSet), [`ProgressStore`](crate::progress::ProgressStore))
//! own the encoding. [`Database`](crate::db::Database) is the SQLite-backed
//! implementation, [`MemoryStore`] keeps everything in process memory.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key-value storage that survives process restart.
///
/// Errors are returned uninterpreted; callers never retry storage operations.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read one value
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite one value
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Delete one value (no-op if absent)
    async fn remove(&self, namespace: &str, key: &str) -> Result<()>;

    /// All entries of a namespace, in insertion order
    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>>;

    /// Delete every entry of a namespace
    async fn clear(&self, namespace: &str) -> Result<()>;
}

/// In-memory [`DurableStore`] for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    // namespace -> ordered (key, value) pairs
    data: RwLock<HashMap<String, Vec<(String, String)>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .and_then(|entries| entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone()))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let entries = data.entry(namespace.to_string()).or_default();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(entries) = data.get_mut(namespace) {
            entries.retain(|(k, _)| k != key);
        }
        Ok(())
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        let data = self.data.read().await;
        Ok(data.get(namespace).cloned().unwrap_or_default())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.data.write().await.remove(namespace);
        Ok(())
    }
}
