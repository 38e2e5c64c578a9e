//! Deferred writes.
//!
//! Non-GET requests on a configured write route that cannot reach the
//! network are kept in a [`DeferredQueue`] and replayed later, oldest first.
//! An item leaves the queue only once the server has accepted it with a 2xx
//! status. Any other answer bumps its attempt counter and keeps its position.
//!
//! Drains are serialized: a drain started while another one runs waits for
//! it to finish. Each drain attempts every due item at most once, so items
//! enqueued during a drain wait for the next one.

mod retry;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use http::StatusCode;
use offbox_core::{Fetch, InterceptedRequest, RequestIdentity};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use retry::ReplayBackoff;

use crate::metrics;

/// A write waiting to be replayed.
#[derive(Debug, Clone)]
pub struct DeferredWrite {
    id: u64,
    identity: RequestIdentity,
    request: InterceptedRequest,
    enqueued_at: DateTime<Utc>,
    attempts: u32,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl DeferredWrite {
    /// Queue-assigned identifier, unique per queue.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identity of the deferred request.
    pub fn identity(&self) -> &RequestIdentity {
        &self.identity
    }

    /// The deferred request, body included.
    pub fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    /// When the write was deferred.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Number of failed replay attempts.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the last replay attempt happened.
    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }
}

/// Result of replaying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The server accepted the write. The item was removed.
    Delivered {
        /// Item id.
        id: u64,
        /// Identity of the delivered request.
        identity: RequestIdentity,
        /// Response status.
        status: StatusCode,
    },
    /// The network failed or the server did not accept the write. The item
    /// was kept.
    Failed {
        /// Item id.
        id: u64,
        /// Failure description.
        error: String,
    },
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Outcomes of attempted items, in queue order.
    pub outcomes: Vec<ReplayOutcome>,
    /// Items skipped because their backoff has not elapsed.
    pub skipped: usize,
    /// Items left in the queue after the pass.
    pub remaining: usize,
}

impl ReplaySummary {
    /// Delivered items.
    pub fn delivered(&self) -> impl Iterator<Item = (u64, &RequestIdentity)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ReplayOutcome::Delivered { id, identity, .. } => Some((*id, identity)),
            _ => None,
        })
    }

    /// Number of delivered items.
    pub fn delivered_count(&self) -> usize {
        self.delivered().count()
    }

    /// Number of failed attempts.
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ReplayOutcome::Failed { .. }))
            .count()
    }
}

/// Serializable view of a pending item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingWrite {
    /// Item id.
    pub id: u64,
    /// Request method and URL.
    pub identity: String,
    /// When the write was deferred.
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts.
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: Mutex<VecDeque<DeferredWrite>>,
    drain: Mutex<()>,
    next_id: AtomicU64,
}

/// FIFO queue of deferred writes.
///
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    inner: Arc<QueueInner>,
}

impl DeferredQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request and returns its id.
    pub async fn enqueue(&self, identity: RequestIdentity, request: InterceptedRequest) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let item = DeferredWrite {
            id,
            identity,
            request,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_attempt_at: None,
        };
        info!(id, identity = %item.identity, "Write deferred until the network is back");
        self.inner.items.lock().await.push_back(item);
        metrics::record_deferred_enqueued();
        id
    }

    /// Number of pending items.
    pub async fn len(&self) -> usize {
        self.inner.items.lock().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copies of the pending items, oldest first.
    pub async fn items(&self) -> Vec<DeferredWrite> {
        self.inner.items.lock().await.iter().cloned().collect()
    }

    /// Serializable view of the pending items.
    pub async fn pending(&self) -> Vec<PendingWrite> {
        self.inner
            .items
            .lock()
            .await
            .iter()
            .map(|item| PendingWrite {
                id: item.id,
                identity: format!("{} {}", item.identity.method(), item.identity.url()),
                enqueued_at: item.enqueued_at,
                attempts: item.attempts,
            })
            .collect()
    }

    /// Replays due items once, oldest first.
    pub async fn drain<F>(&self, fetch: &F, backoff: &ReplayBackoff) -> ReplaySummary
    where
        F: Fetch + ?Sized,
    {
        let _drain = self.inner.drain.lock().await;
        let now = Utc::now();
        let mut summary = ReplaySummary::default();

        let due: Vec<(u64, InterceptedRequest)> = {
            let items = self.inner.items.lock().await;
            items
                .iter()
                .filter_map(|item| {
                    if backoff.is_due(item.attempts, item.last_attempt_at, now) {
                        Some((item.id, item.request.clone()))
                    } else {
                        summary.skipped += 1;
                        None
                    }
                })
                .collect()
        };

        for (id, request) in due {
            let outcome = match fetch.fetch(&request).await {
                Ok(response) if response.status().is_success() => {
                    let identity = self.remove(id).await.map(|item| item.identity);
                    match identity {
                        Some(identity) => ReplayOutcome::Delivered {
                            id,
                            identity,
                            status: response.status(),
                        },
                        None => continue,
                    }
                }
                Ok(response) => {
                    self.mark_failed(id).await;
                    ReplayOutcome::Failed {
                        id,
                        error: format!("server responded {}", response.status()),
                    }
                }
                Err(error) => {
                    self.mark_failed(id).await;
                    ReplayOutcome::Failed {
                        id,
                        error: error.to_string(),
                    }
                }
            };
            let delivered = matches!(outcome, ReplayOutcome::Delivered { .. });
            debug!(id, delivered, "Deferred write replayed");
            metrics::record_deferred_replayed(delivered);
            summary.outcomes.push(outcome);
        }

        summary.remaining = self.len().await;
        if !summary.outcomes.is_empty() {
            info!(
                delivered = summary.delivered_count(),
                failed = summary.failed_count(),
                skipped = summary.skipped,
                remaining = summary.remaining,
                "Deferred write replay finished"
            );
        }
        summary
    }

    async fn remove(&self, id: u64) -> Option<DeferredWrite> {
        let mut items = self.inner.items.lock().await;
        let position = items.iter().position(|item| item.id == id)?;
        items.remove(position)
    }

    async fn mark_failed(&self, id: u64) {
        let mut items = self.inner.items.lock().await;
        if let Some(item) = items.iter_mut().find(|item| item.id == id) {
            item.attempts += 1;
            item.last_attempt_at = Some(Utc::now());
        }
    }
}
