#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # offbox
//!
//! Offline request orchestration for client applications.
//!
//! Every outbound request of the application is classified into a traffic
//! class, and each class runs a caching strategy against a versioned
//! artifact store with a fixed fallback order. The application keeps
//! working, degraded, without connectivity:
//!
//! - navigations fall back to stored pages, then to an offline page;
//! - API calls fall back to stored responses, then to a `503` JSON body;
//! - images fall back to a placeholder;
//! - writes that cannot reach the network are queued and replayed.
//!
//! The [`ServiceWorker`] ties it together. The host runtime hands it
//! [`Signal`]s (install, activate, intercepted requests, messages, push,
//! notification clicks, timers, connectivity changes) and receives
//! [`Reply`]s.
//!
//! ```no_run
//! use http::Uri;
//! use offbox::{OfflineConfig, Reply, ServiceWorker, Signal};
//! use offbox_backend::MemoryStore;
//! use offbox_core::InterceptedRequest;
//! # use std::sync::Arc;
//! # fn fetch() -> Arc<dyn offbox_core::Fetch> { unimplemented!() }
//! # struct Silent;
//! # #[async_trait::async_trait]
//! # impl offbox::Notifier for Silent { async fn show(&self, _: offbox::Notification) {} }
//! # #[async_trait::async_trait]
//! # impl offbox::ViewHost for Silent {
//! #     async fn views(&self) -> Vec<offbox::View> { vec![] }
//! #     async fn focus(&self, _: &str) {}
//! #     async fn open(&self, _: &str) {}
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), offbox::Error> {
//! let config = OfflineConfig::builder("v1", "https://shop.example.com")
//!     .essential_assets(["/", "/offline.html"])
//!     .fallback_page("/offline.html")
//!     .api_host("api.example.com")
//!     .build()?;
//!
//! let worker = ServiceWorker::new(config, MemoryStore::new(), fetch(), Silent, Silent);
//! worker.handle(Signal::Install).await?;
//! worker.handle(Signal::Activate).await?;
//!
//! let request = InterceptedRequest::get(Uri::from_static("https://api.example.com/products"));
//! if let Reply::Served(served) = worker.handle(Signal::Fetch(request)).await? {
//!     println!("{} from {:?}", served.response.status(), served.source);
//! }
//! # Ok(())
//! # }
//! ```

/// Request classification into traffic classes.
pub mod classifier;

/// Versioned configuration, loadable from YAML.
pub mod config;

/// Per-class caching strategies.
pub mod engine;

/// Error types.
///
/// Defines [`Error`] which covers:
/// - Install failures (the only fatal error)
/// - Store and network failures outside the request fallbacks
/// - Configuration errors
pub mod error;

/// Synthesized responses.
pub mod fallback;

/// Install, activation and cleanup of versioned generations.
pub mod lifecycle;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Served responses by class and source
/// - Background task spawns and completions
/// - Deferred write enqueues and replays
/// - Generation deletions
pub mod metrics;

/// Notifications and notification click routing.
pub mod notify;

/// Background task offloading.
///
/// Background refreshes of stored assets and detached store writes run
/// through the [`OffloadManager`](offload::OffloadManager), which tracks
/// them, deduplicates refreshes of the same identity and never cancels them.
pub mod offload;

/// Queue and replay of writes that could not reach the network.
pub mod queue;

/// Signal dispatch.
pub mod worker;

pub use classifier::{Classifier, Rule};
pub use config::{
    CleanupPolicy, ConfigError, OfflineConfig, OfflineConfigBuilder, PageTemplate, WriteRoute,
};
pub use engine::{Served, Source, StrategyEngine};
pub use error::{AssetFailure, Error, InstallError};
pub use lifecycle::{LifecycleManager, LifecyclePhase};
pub use notify::{Notification, NotificationDispatcher, Notifier, View, ViewAction, ViewHost};
pub use queue::{DeferredQueue, DeferredWrite, ReplayBackoff, ReplayOutcome, ReplaySummary};
pub use worker::{CacheStatusReport, Effect, Message, Outcome, Reply, ServiceWorker, Signal};

pub use offbox_core::{Category, Strategy, TrafficClass};
