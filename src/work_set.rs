//! Deduplicated, append-only registry of every item key submitted to a job.
//!
//! The whole set is persisted as one JSON array under the [`WORK_SET_NAMESPACE`]
//! namespace, keyed by job name. Iteration order is discovery order, which is
//! also the order the scheduler dispatches pending keys in.

use crate::error::Result;
use crate::store::DurableStore;
use crate::types::ItemKey;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Namespace holding one work set record per job
pub const WORK_SET_NAMESPACE: &str = "work_set";

/// Typed repository over the persisted work set of one job.
///
/// Clones share one write lock, so merges and clears issued through any clone
/// of the same handle are serialized.
#[derive(Clone)]
pub struct WorkSet {
    store: Arc<dyn DurableStore>,
    job: String,
    write_lock: Arc<Mutex<()>>,
}

impl WorkSet {
    /// Create a work set handle for `job`
    pub fn new(store: Arc<dyn DurableStore>, job: impl Into<String>) -> Self {
        Self {
            store,
            job: job.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Union `new_keys` into the persisted set.
    ///
    /// Returns how many keys were new. Duplicates inside `new_keys` count once.
    /// Nothing is written when no key is new.
    pub async fn merge(&self, new_keys: &[ItemKey]) -> Result<usize> {
        if new_keys.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut keys = self.all().await?;
        let mut seen: HashSet<ItemKey> = keys.iter().cloned().collect();
        let before = keys.len();

        for key in new_keys {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }

        let added = keys.len() - before;
        if added > 0 {
            let encoded = serde_json::to_string(&keys)?;
            self.store
                .set(WORK_SET_NAMESPACE, &self.job, &encoded)
                .await?;
            tracing::debug!(job = %self.job, added, total = keys.len(), "Work set extended");
        }

        Ok(added)
    }

    /// Every key ever submitted, in discovery order
    pub async fn all(&self) -> Result<Vec<ItemKey>> {
        match self.store.get(WORK_SET_NAMESPACE, &self.job).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Delete the persisted set
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(WORK_SET_NAMESPACE, &self.job).await
    }

    /// Job name this set belongs to
    pub fn job(&self) -> &str {
        &self.job
    }
}
