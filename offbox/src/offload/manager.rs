//! OffloadManager implementation for background task execution.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use offbox_core::RequestIdentity;
use smol_str::SmolStr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::{OffloadConfig, SlowTaskPolicy};
use crate::metrics;

/// Key for identifying offloaded tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OffloadKey {
    /// Background refresh of a stored identity (deduplicated).
    Refresh(RequestIdentity),
    /// Auto-generated key for other tasks with a kind prefix.
    Generated {
        /// Kind of the task (e.g., "store_write").
        kind: SmolStr,
        /// Unique identifier within the kind.
        id: u64,
    },
}

impl OffloadKey {
    /// Returns the key type for metrics labels and spans.
    pub fn key_type(&self) -> SmolStr {
        match self {
            Self::Refresh(_) => SmolStr::new_static("refresh"),
            Self::Generated { kind, .. } => kind.clone(),
        }
    }
}

impl From<RequestIdentity> for OffloadKey {
    fn from(identity: RequestIdentity) -> Self {
        Self::Refresh(identity)
    }
}

#[derive(Debug)]
struct OffloadManagerInner {
    config: OffloadConfig,
    tasks: DashMap<OffloadKey, JoinHandle<()>>,
    key_counter: AtomicU64,
    spawned: AtomicU64,
    completed: AtomicU64,
}

/// Manager for detached background tasks.
///
/// Supports refresh deduplication, slow-task warnings and counters. Clones
/// share the same registry.
#[derive(Clone, Debug)]
pub struct OffloadManager {
    inner: Arc<OffloadManagerInner>,
}

impl OffloadManager {
    /// Create a new OffloadManager with the given configuration.
    pub fn new(config: OffloadConfig) -> Self {
        Self {
            inner: Arc::new(OffloadManagerInner {
                config,
                tasks: DashMap::new(),
                key_counter: AtomicU64::new(0),
                spawned: AtomicU64::new(0),
                completed: AtomicU64::new(0),
            }),
        }
    }

    /// Create a new OffloadManager with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(OffloadConfig::default())
    }

    fn next_key(&self, kind: impl Into<SmolStr>) -> OffloadKey {
        let id = self.inner.key_counter.fetch_add(1, Ordering::Relaxed);
        OffloadKey::Generated {
            kind: kind.into(),
            id,
        }
    }

    /// Spawn a task with auto-generated key and specified kind.
    pub fn spawn<F>(&self, kind: impl Into<SmolStr>, task: F) -> OffloadKey
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = self.next_key(kind);
        self.spawn_with_key(key.clone(), task);
        key
    }

    /// Spawn a task with a specific key.
    ///
    /// If a refresh for the same identity is still in flight and
    /// deduplication is enabled, the new task is skipped.
    ///
    /// Returns `true` if the task was spawned, `false` if it was deduplicated.
    pub fn spawn_with_key<K, F>(&self, key: K, task: F) -> bool
    where
        K: Into<OffloadKey>,
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();

        if self.inner.config.deduplicate
            && matches!(&key, OffloadKey::Refresh(_))
            && self.is_in_flight(&key)
        {
            debug!(?key, "Task deduplicated - already in flight");
            metrics::record_offload_deduplicated(&key.key_type());
            return false;
        }

        // The task starts only once its handle is registered, so its own
        // removal on completion can never run before the insert.
        let (registered_tx, registered_rx) = oneshot::channel();
        let handle = self.spawn_inner(task, key.clone(), registered_rx);
        self.inner.tasks.insert(key.clone(), handle);
        let _ = registered_tx.send(());
        self.inner.spawned.fetch_add(1, Ordering::Relaxed);
        metrics::record_offload_spawned(&key.key_type());
        true
    }

    /// Number of currently running tasks.
    pub fn active_task_count(&self) -> usize {
        self.inner.tasks.iter().filter(|e| !e.is_finished()).count()
    }

    /// Total number of tasks spawned since creation.
    pub fn spawned_count(&self) -> u64 {
        self.inner.spawned.load(Ordering::Relaxed)
    }

    /// Total number of tasks that ran to completion.
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Drop handles of finished tasks.
    pub fn cleanup_finished(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }

    /// Check if a task with the given key is in flight.
    pub fn is_in_flight(&self, key: &OffloadKey) -> bool {
        self.inner.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    /// Wait for all currently tracked tasks to complete.
    ///
    /// The response path never calls this; it exists for shutdown and tests.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();
            if self.inner.tasks.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Wait for all tasks with a timeout.
    ///
    /// Returns `true` if all tasks completed within the timeout. Tasks still
    /// running after the timeout keep running.
    pub async fn wait_all_timeout(&self, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }

    fn spawn_inner<F>(
        &self,
        task: F,
        key: OffloadKey,
        registered: oneshot::Receiver<()>,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slow_task_policy = self.inner.config.slow_task_policy.clone();
        let inner = Arc::clone(&self.inner);
        let key_type = key.key_type();

        let span = info_span!(
            "offload_task",
            key_type = %key_type,
            key = ?key,
        );

        tokio::spawn(
            async move {
                let _ = registered.await;
                let start = Instant::now();
                task.await;
                let elapsed = start.elapsed();
                if let SlowTaskPolicy::Warn(threshold) = slow_task_policy
                    && elapsed > threshold
                {
                    warn!(
                        ?key,
                        elapsed_ms = elapsed.as_millis(),
                        threshold_ms = threshold.as_millis(),
                        "Offload task exceeded slow task threshold"
                    );
                }
                inner.tasks.remove(&key);
                inner.completed.fetch_add(1, Ordering::Relaxed);
                metrics::record_offload_completed(&key_type, elapsed);
            }
            .instrument(span),
        )
    }
}

impl Default for OffloadManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl offbox_core::Offload for OffloadManager {
    fn spawn<F>(&self, kind: impl Into<SmolStr>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        OffloadManager::spawn(self, kind, future);
    }

    fn spawn_for<F>(&self, identity: RequestIdentity, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_with_key(identity, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Uri;

    fn identity() -> RequestIdentity {
        RequestIdentity::get(&Uri::from_static("https://app.test/app.js"))
    }

    #[tokio::test]
    async fn refreshes_for_same_identity_are_deduplicated() {
        let manager = OffloadManager::with_defaults();
        let (tx, rx) = oneshot::channel::<()>();

        assert!(manager.spawn_with_key(identity(), async move {
            let _ = rx.await;
        }));
        assert!(!manager.spawn_with_key(identity(), async {}));

        tx.send(()).unwrap();
        manager.wait_all().await;
        assert_eq!(manager.spawned_count(), 1);
        assert_eq!(manager.completed_count(), 1);

        assert!(manager.spawn_with_key(identity(), async {}));
        manager.wait_all().await;
    }

    #[tokio::test]
    async fn generated_keys_are_never_deduplicated() {
        let manager = OffloadManager::with_defaults();
        manager.spawn("store_write", async {});
        manager.spawn("store_write", async {});
        manager.wait_all().await;
        assert_eq!(manager.completed_count(), 2);
        assert_eq!(manager.active_task_count(), 0);
    }

    #[tokio::test]
    async fn finished_tasks_leave_the_registry() {
        let manager = OffloadManager::with_defaults();
        for _ in 0..1000 {
            manager.spawn("store_write", async {});
        }
        while manager.completed_count() < 1000 {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.spawned_count(), 1000);
        assert!(manager.inner.tasks.is_empty());
    }

    #[tokio::test]
    async fn finished_refresh_frees_its_identity() {
        let manager = OffloadManager::with_defaults();
        assert!(manager.spawn_with_key(identity(), async {}));
        while manager.completed_count() < 1 {
            tokio::task::yield_now().await;
        }
        assert!(!manager.is_in_flight(&OffloadKey::Refresh(identity())));
        assert!(manager.inner.tasks.is_empty());
    }
}
