//! Shared test helpers for driving a BatchScheduler without a network.

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::pipeline::BatchScheduler;
use crate::progress::PROGRESS_NAMESPACE;
use crate::store::{DurableStore, MemoryStore};
use crate::types::{ItemKey, Payload, TagMetadata};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetcher returning scripted outcomes per key, instrumented to count
/// concurrent invocations.
///
/// Keys without a script (or whose script is exhausted) succeed with a tag
/// payload whose translation is the key itself.
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<ItemKey, VecDeque<FetchOutcome>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<ItemKey>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue outcomes for `key`, consumed one per fetch
    pub(crate) fn script(&self, key: &str, outcomes: Vec<FetchOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(ItemKey::from(key))
            .or_default()
            .extend(outcomes);
    }

    /// Every fetch so far, in call order
    pub(crate) fn calls(&self) -> Vec<ItemKey> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of fetches issued for `key`
    pub(crate) fn calls_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }

    /// Highest number of simultaneous fetches observed
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` fetches were issued, panicking after 5s
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.calls().len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} fetches"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn next_outcome(&self, key: &ItemKey) -> FetchOutcome {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                FetchOutcome::Success(Payload::Tag(TagMetadata {
                    translation: Some(key.to_string()),
                    ..Default::default()
                }))
            })
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, key: &ItemKey, cancel: &CancellationToken) -> FetchOutcome {
        self.calls.lock().unwrap().push(key.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.delay) => false,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if cancelled {
            FetchOutcome::Cancelled
        } else {
            self.next_outcome(key)
        }
    }
}

/// Store whose progress writes start failing after a fixed number succeed
pub(crate) struct FailingStore {
    inner: MemoryStore,
    progress_writes_left: AtomicUsize,
}

impl FailingStore {
    pub(crate) fn new(progress_writes_allowed: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            progress_writes_left: AtomicUsize::new(progress_writes_allowed),
        }
    }
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        if namespace.starts_with(PROGRESS_NAMESPACE) {
            let left = self
                .progress_writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if left.is_err() {
                return Err(Error::Storage("disk full".to_string()));
            }
        }
        self.inner.set(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.inner.remove(namespace, key).await
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        self.inner.entries(namespace).await
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.inner.clear(namespace).await
    }
}

/// Store whose progress writes each take `delay`
pub(crate) struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl DurableStore for SlowStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        if namespace.starts_with(PROGRESS_NAMESPACE) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.inner.remove(namespace, key).await
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        self.inner.entries(namespace).await
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.inner.clear(namespace).await
    }
}

/// Scheduler over an in-memory store
pub(crate) fn create_test_scheduler(fetcher: Arc<ScriptedFetcher>) -> BatchScheduler {
    BatchScheduler::new(Arc::new(MemoryStore::new()), fetcher, "test")
}

/// Run config with no pacing and a short rate-limit wait
pub(crate) fn fast_config(concurrency: usize) -> RunConfig {
    RunConfig {
        concurrency,
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        rate_limit_wait: Duration::from_millis(20),
    }
}

/// `["k0", "k1", ...]`
pub(crate) fn keys(n: usize) -> Vec<ItemKey> {
    (0..n).map(|i| ItemKey::new(format!("k{i}"))).collect()
}
