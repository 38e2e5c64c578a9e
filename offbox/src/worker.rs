//! Signal dispatch.
//!
//! The [`ServiceWorker`] is the single entry point of the orchestrator. The
//! host runtime turns everything it observes into a [`Signal`] and calls
//! [`ServiceWorker::handle`]. Each signal kind has its own handler that
//! returns an [`Outcome`]: the [`Reply`] for the host plus a list of
//! [`Effect`]s (notifications, view actions) which are applied after the
//! handler finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use offbox_backend::ArtifactStore;
use offbox_core::{Fetch, InterceptedRequest};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::engine::{Served, Source, StrategyEngine};
use crate::lifecycle::{
    Activation, Cleanup, ForceActivation, GenerationStatus, Installed, LifecycleManager,
    LifecyclePhase,
};
use crate::notify::{Notification, NotificationDispatcher, Notifier, ViewAction, ViewHost};
use crate::offload::OffloadManager;
use crate::queue::{DeferredQueue, PendingWrite, ReplayBackoff, ReplaySummary};
use crate::{Classifier, Error, OfflineConfig, fallback};

/// Periodic tag that triggers cleanup of old entries.
pub const CLEANUP_TAG: &str = "cache-cleanup";
/// Periodic tag that triggers a replay of deferred writes.
pub const REPLAY_TAG: &str = "deferred-writes";
/// Tag of connectivity notifications.
pub const CONNECTIVITY_TAG: &str = "connectivity";

/// Something the host runtime observed.
#[derive(Debug, Clone)]
pub enum Signal {
    /// Install the staged version.
    Install,
    /// Activate the waiting version.
    Activate,
    /// An outbound request was intercepted.
    Fetch(InterceptedRequest),
    /// A message from the application, as JSON.
    Message(serde_json::Value),
    /// A push payload.
    Push(Bytes),
    /// The user clicked a notification.
    NotificationClick {
        /// Action id of the clicked button, empty for the body.
        action: String,
        /// Target address carried by the notification.
        url: Option<String>,
    },
    /// A periodic timer fired.
    Periodic(String),
    /// Connectivity changed.
    Connectivity(bool),
}

/// Recognized application messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Activate the waiting version without waiting.
    #[serde(alias = "force-activate")]
    SkipWaiting,
    /// Delete generations; all current ones when `names` is empty.
    ClearCache {
        /// Generation names.
        #[serde(default)]
        names: Vec<String>,
    },
    /// Report versions, generations and pending writes.
    GetCacheStatus,
    /// Replay deferred writes now.
    ReplayWrites,
}

impl Message {
    /// Parses a message payload. Bare strings name a message without fields.
    pub fn parse(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        let payload = match payload {
            serde_json::Value::String(kind) => serde_json::json!({ "type": kind }),
            other => other,
        };
        serde_json::from_value(payload)
    }
}

impl From<Message> for Signal {
    fn from(message: Message) -> Self {
        // Serializing a unit or struct variant cannot fail.
        Signal::Message(serde_json::to_value(message).unwrap_or_default())
    }
}

/// State report returned for [`Message::GetCacheStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatusReport {
    /// Active version.
    pub version: Option<SmolStr>,
    /// Version waiting for activation.
    pub waiting: Option<SmolStr>,
    /// Lifecycle phase.
    pub phase: LifecyclePhase,
    /// Existing generations.
    pub generations: Vec<GenerationStatus>,
    /// Deferred writes not yet delivered.
    pub pending_writes: Vec<PendingWrite>,
}

/// Answer to a signal.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Response for an intercepted request.
    Served(Served),
    /// The staged version was installed.
    Installed(Installed),
    /// Activation finished.
    Activated(Activation),
    /// Force-activation handled.
    ForceActivated(ForceActivation),
    /// Generations deleted by a clear.
    Cleared(Vec<String>),
    /// Cache status.
    Status(Box<CacheStatusReport>),
    /// Deferred writes replayed.
    Replayed(ReplaySummary),
    /// Periodic cleanup finished.
    Cleaned(Cleanup),
    /// Handled without a result.
    Done,
    /// Malformed or unknown input; nothing happened.
    Ignored,
}

/// Side effect applied after a handler finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show a notification.
    Notify(Notification),
    /// Focus or open a view.
    View(ViewAction),
}

/// Result of a signal handler.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Answer for the host.
    pub reply: Reply,
    /// Effects to apply.
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            effects: Vec::new(),
        }
    }

    fn with_effects(reply: Reply, effects: Vec<Effect>) -> Self {
        Self { reply, effects }
    }
}

/// The orchestrator.
///
/// Owns the lifecycle state, the deferred-write queue and the handles to
/// store and network. Clones share everything.
pub struct ServiceWorker<S, F, N, V> {
    staged: Arc<RwLock<Arc<OfflineConfig>>>,
    store: S,
    fetch: F,
    lifecycle: LifecycleManager<S, F>,
    queue: DeferredQueue,
    dispatcher: Arc<NotificationDispatcher<N, V>>,
    offload: OffloadManager,
    classifiers: Arc<DashMap<SmolStr, CachedClassifier>>,
    online: Arc<AtomicBool>,
}

/// Rule table built for one installed configuration.
#[derive(Debug)]
struct CachedClassifier {
    config: Arc<OfflineConfig>,
    classifier: Arc<Classifier>,
}

impl CachedClassifier {
    fn new(config: &Arc<OfflineConfig>) -> Self {
        Self {
            config: Arc::clone(config),
            classifier: Arc::new(Classifier::new(config)),
        }
    }
}

impl<S, F, N, V> Clone for ServiceWorker<S, F, N, V>
where
    S: Clone,
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            staged: Arc::clone(&self.staged),
            store: self.store.clone(),
            fetch: self.fetch.clone(),
            lifecycle: self.lifecycle.clone(),
            queue: self.queue.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            offload: self.offload.clone(),
            classifiers: Arc::clone(&self.classifiers),
            online: Arc::clone(&self.online),
        }
    }
}

impl<S, F, N, V> std::fmt::Debug for ServiceWorker<S, F, N, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("queue", &self.queue)
            .field("offload", &self.offload)
            .field("online", &self.online)
            .finish_non_exhaustive()
    }
}

impl<S, F, N, V> ServiceWorker<S, F, N, V>
where
    S: ArtifactStore + Clone + 'static,
    F: Fetch + Clone + 'static,
    N: Notifier,
    V: ViewHost,
{
    /// Creates a worker with `config` staged for installation.
    pub fn new(config: OfflineConfig, store: S, fetch: F, notifier: N, views: V) -> Self {
        Self {
            staged: Arc::new(RwLock::new(Arc::new(config))),
            lifecycle: LifecycleManager::new(store.clone(), fetch.clone()),
            store,
            fetch,
            queue: DeferredQueue::new(),
            dispatcher: Arc::new(NotificationDispatcher::new(notifier, views)),
            offload: OffloadManager::with_defaults(),
            classifiers: Arc::default(),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Uses a custom offload manager for background work.
    pub fn with_offload(self, offload: OffloadManager) -> Self {
        Self { offload, ..self }
    }

    /// Stages a new version; the next [`Signal::Install`] installs it.
    pub async fn stage(&self, config: OfflineConfig) {
        info!(version = %config.version, "Version staged");
        *self.staged.write().await = Arc::new(config);
    }

    /// Lifecycle manager.
    pub fn lifecycle(&self) -> &LifecycleManager<S, F> {
        &self.lifecycle
    }

    /// Deferred-write queue.
    pub fn queue(&self) -> &DeferredQueue {
        &self.queue
    }

    /// Background task manager.
    pub fn offload(&self) -> &OffloadManager {
        &self.offload
    }

    /// Handles a signal and applies its effects.
    pub async fn handle(&self, signal: Signal) -> Result<Reply, Error> {
        let outcome = self.dispatch(signal).await?;
        self.apply(outcome.effects).await;
        Ok(outcome.reply)
    }

    /// Runs the handler of a signal without applying its effects.
    pub async fn dispatch(&self, signal: Signal) -> Result<Outcome, Error> {
        match signal {
            Signal::Install => self.on_install().await,
            Signal::Activate => self.on_activate().await,
            Signal::Fetch(request) => self.on_fetch(request).await,
            Signal::Message(payload) => self.on_message(payload).await,
            Signal::Push(payload) => Ok(self.on_push(&payload)),
            Signal::NotificationClick { action, url } => {
                Ok(self.on_notification_click(&action, url.as_deref()).await)
            }
            Signal::Periodic(tag) => self.on_periodic(&tag).await,
            Signal::Connectivity(online) => Ok(self.on_connectivity(online).await),
        }
    }

    /// Applies effects in order.
    pub async fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notification) => self.dispatcher.notify(notification).await,
                Effect::View(action) => self.dispatcher.perform(&action).await,
            }
        }
    }

    async fn on_install(&self) -> Result<Outcome, Error> {
        let config = OfflineConfig::clone(&*self.staged.read().await);
        let installed = self.lifecycle.install(config).await?;
        Ok(Outcome::reply(Reply::Installed(installed)))
    }

    async fn on_activate(&self) -> Result<Outcome, Error> {
        let activation = self.lifecycle.activate().await?;
        Ok(Outcome::reply(Reply::Activated(activation)))
    }

    async fn on_fetch(&self, request: InterceptedRequest) -> Result<Outcome, Error> {
        let serving = self.lifecycle.serving().await;
        let Some(config) = serving.config().cloned() else {
            debug!(uri = %request.uri(), "No active version, passing through");
            let response = self.fetch.fetch(&request).await?;
            return Ok(Outcome::reply(Reply::Served(Served::unclassified(
                response,
                Source::Network,
            ))));
        };

        let classifier = self.classifier(&config);
        let served = match classifier.classify(&request) {
            Some(class) => {
                let engine = StrategyEngine::new(
                    Arc::clone(&config),
                    self.store.clone(),
                    self.fetch.clone(),
                    self.offload.clone(),
                );
                engine.handle(&request, class).await?
            }
            None => self.pass_through(&config, request).await?,
        };
        drop(serving);
        Ok(Outcome::reply(Reply::Served(served)))
    }

    async fn pass_through(
        &self,
        config: &OfflineConfig,
        request: InterceptedRequest,
    ) -> Result<Served, Error> {
        match self.fetch.fetch(&request).await {
            Ok(response) => Ok(Served::unclassified(response, Source::Network)),
            Err(error) if config.is_write_route(&request) => {
                debug!(%error, uri = %request.uri(), "Write failed, deferring");
                let identity = request.identity(&config.vary_headers);
                let id = self.queue.enqueue(identity, request).await;
                Ok(Served::unclassified(fallback::queued(id), Source::Queued))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Rule table of the given configuration, rebuilt when a different
    /// configuration was installed under the same version label.
    fn classifier(&self, config: &Arc<OfflineConfig>) -> Arc<Classifier> {
        let mut entry = self
            .classifiers
            .entry(config.version.clone())
            .or_insert_with(|| CachedClassifier::new(config));
        if !Arc::ptr_eq(&entry.config, config) {
            debug!(version = %config.version, "Configuration changed, rebuilding rules");
            *entry = CachedClassifier::new(config);
        }
        Arc::clone(&entry.classifier)
    }

    async fn on_message(&self, payload: serde_json::Value) -> Result<Outcome, Error> {
        let message = match Message::parse(payload) {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, "Ignoring malformed message");
                return Ok(Outcome::reply(Reply::Ignored));
            }
        };
        debug!(?message, "Message received");
        match message {
            Message::SkipWaiting => {
                let result = self.lifecycle.force_activate().await?;
                Ok(Outcome::reply(Reply::ForceActivated(result)))
            }
            Message::ClearCache { names } => {
                let deleted = self.lifecycle.clear(&names).await?;
                Ok(Outcome::reply(Reply::Cleared(deleted)))
            }
            Message::GetCacheStatus => {
                let report = self.status().await?;
                Ok(Outcome::reply(Reply::Status(Box::new(report))))
            }
            Message::ReplayWrites => Ok(self.replay().await),
        }
    }

    /// Builds the cache status report.
    pub async fn status(&self) -> Result<CacheStatusReport, Error> {
        Ok(CacheStatusReport {
            version: self.lifecycle.active().await.map(|c| c.version.clone()),
            waiting: self.lifecycle.waiting().await.map(|c| c.version.clone()),
            phase: self.lifecycle.phase().await,
            generations: self.lifecycle.generations().await?,
            pending_writes: self.queue.pending().await,
        })
    }

    fn on_push(&self, payload: &Bytes) -> Outcome {
        match serde_json::from_slice::<Notification>(payload) {
            Ok(notification) => {
                Outcome::with_effects(Reply::Done, vec![Effect::Notify(notification)])
            }
            Err(error) => {
                debug!(%error, "Ignoring malformed push payload");
                Outcome::reply(Reply::Ignored)
            }
        }
    }

    async fn on_notification_click(&self, action: &str, url: Option<&str>) -> Outcome {
        match self.dispatcher.on_action(action, url).await {
            Some(view_action) => {
                Outcome::with_effects(Reply::Done, vec![Effect::View(view_action)])
            }
            None => Outcome::reply(Reply::Done),
        }
    }

    async fn on_periodic(&self, tag: &str) -> Result<Outcome, Error> {
        match tag {
            CLEANUP_TAG => {
                let report = self.lifecycle.cleanup().await?;
                Ok(Outcome::reply(Reply::Cleaned(report)))
            }
            REPLAY_TAG => Ok(self.replay().await),
            other => {
                debug!(tag = other, "Ignoring unknown periodic tag");
                Ok(Outcome::reply(Reply::Ignored))
            }
        }
    }

    async fn on_connectivity(&self, online: bool) -> Outcome {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if !online {
            if !was_online {
                return Outcome::reply(Reply::Done);
            }
            info!("Connectivity lost");
            let notification = Notification::new(
                "You are offline",
                "Saved pages stay available. Changes will be sent when you are back online.",
            )
            .with_tag(CONNECTIVITY_TAG);
            return Outcome::with_effects(Reply::Done, vec![Effect::Notify(notification)]);
        }

        info!("Connectivity restored");
        let mut outcome = self.replay().await;
        if let Reply::Replayed(summary) = &outcome.reply
            && summary.delivered_count() > 0
        {
            outcome.effects.push(Effect::Notify(
                Notification::new(
                    "Back online",
                    format!("{} pending change(s) were sent.", summary.delivered_count()),
                )
                .with_tag(CONNECTIVITY_TAG),
            ));
        }
        outcome
    }

    async fn replay(&self) -> Outcome {
        let backoff = match self.lifecycle.active().await {
            Some(config) => config.replay,
            None => ReplayBackoff::default(),
        };
        let summary = self.queue.drain(&self.fetch, &backoff).await;
        let effects = summary
            .delivered()
            .map(|(id, identity)| {
                Effect::Notify(
                    Notification::new(
                        "Sync complete",
                        format!("Your request {} {} was sent.", identity.method(), identity.url()),
                    )
                    .with_tag(format!("deferred-write-{id}")),
                )
            })
            .collect();
        Outcome::with_effects(Reply::Replayed(summary), effects)
    }
}
