//! Per-class caching strategies.
//!
//! The [`StrategyEngine`] runs the strategy of a request's [`TrafficClass`]
//! against the network and the current generations of the active version:
//!
//! - **store-first**: serve a stored snapshot and refresh it in the
//!   background, or fetch on a miss.
//! - **network-first**: fetch and store; on failure fall back to the stored
//!   snapshot, the fallback page, then a synthesized response.
//! - **network-first with detached write**: like network-first, but the
//!   store write does not hold up the response.
//! - **store-first with placeholder**: like store-first without refresh, with
//!   an SVG placeholder when everything fails.
//!
//! Only 2xx responses are ever stored. Store failures on this path never
//! reach the caller: a failed read is a miss and a failed write is logged
//! and dropped.

mod served;
mod strategy;

use std::sync::Arc;
use std::time::Instant;

use offbox_backend::{ArtifactStore, StoreError};
use offbox_core::{
    Category, Fetch, FetchError, InterceptedRequest, Offload, RequestIdentity, ResponseSnapshot,
    Strategy, TrafficClass,
};
use tracing::{Instrument, debug, debug_span, warn};

pub use served::{Served, Source};

use crate::offload::OffloadManager;
use crate::{OfflineConfig, metrics};

/// Runs caching strategies for one active version.
///
/// Cloning is cheap; all parts are shared.
#[derive(Debug, Clone)]
pub struct StrategyEngine<S, F, O = OffloadManager> {
    config: Arc<OfflineConfig>,
    store: S,
    fetch: F,
    offload: O,
}

impl<S, F, O> StrategyEngine<S, F, O>
where
    S: ArtifactStore + Clone + 'static,
    F: Fetch + Clone + 'static,
    O: Offload + 'static,
{
    /// Creates an engine for the given active configuration.
    pub fn new(config: Arc<OfflineConfig>, store: S, fetch: F, offload: O) -> Self {
        Self {
            config,
            store,
            fetch,
            offload,
        }
    }

    /// Returns the configuration this engine serves.
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Handles a classified request.
    ///
    /// Returns an error only when the network failed and the class has no
    /// substitute for this request.
    pub async fn handle(
        &self,
        request: &InterceptedRequest,
        class: TrafficClass,
    ) -> Result<Served, FetchError> {
        let started = Instant::now();
        let span = debug_span!("strategy", class = %class, uri = %request.uri());
        let result = async {
            match class.strategy() {
                Strategy::StoreFirst => self.store_first(request, class).await,
                Strategy::NetworkFirst => self.network_first(request, class).await,
                Strategy::NetworkFirstDeferredWrite => {
                    self.network_first_detached_write(request, class).await
                }
                Strategy::StoreFirstWithPlaceholder => {
                    self.store_first_with_placeholder(request, class).await
                }
            }
        }
        .instrument(span)
        .await;
        match &result {
            Ok(served) => {
                debug!(
                    source = served.source.as_str(),
                    status = %served.response.status(),
                    "Request served"
                );
                metrics::record_served(class.as_str(), served.source.as_str(), started.elapsed());
            }
            Err(error) => debug!(%error, "No substitute for failed request"),
        }
        result
    }

    /// Store identity of a request. Relative URIs are resolved against the
    /// application origin.
    pub fn identity(&self, request: &InterceptedRequest) -> RequestIdentity {
        let vary = &self.config.vary_headers;
        if request.uri().host().is_some() {
            return request.identity(vary);
        }
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        match self.config.asset_uri(path_and_query) {
            Ok(uri) => RequestIdentity::new(request.method(), &uri, request.headers(), vary),
            Err(_) => request.identity(vary),
        }
    }

    /// Reads the current generation of a category. Failures are misses.
    pub(crate) async fn lookup(
        &self,
        category: Category,
        identity: &RequestIdentity,
    ) -> Option<ResponseSnapshot> {
        let name = self.config.generation_name(category);
        let result = match self.store.open(&name).await {
            Ok(generation) => self.store.get(&generation, identity).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(found) => {
                debug!(generation = %name, %identity, hit = found.is_some(), "Store lookup");
                found
            }
            Err(error) => {
                warn!(generation = %name, %identity, %error, "Store read failed, treating as miss");
                None
            }
        }
    }

    /// Writes a 2xx snapshot into the current generation of a category.
    /// Failures are logged and dropped.
    pub(crate) async fn remember(
        &self,
        category: Category,
        identity: RequestIdentity,
        snapshot: ResponseSnapshot,
    ) {
        let name = self.config.generation_name(category);
        if let Err(error) = store_snapshot(&self.store, &name, identity.clone(), snapshot).await {
            warn!(
                generation = %name,
                %identity,
                %error,
                "Store write failed, response served anyway"
            );
            metrics::record_store_write_error(&name);
        }
    }

    /// Spawns a store write that does not hold up the response.
    pub(crate) fn remember_detached(
        &self,
        category: Category,
        identity: RequestIdentity,
        snapshot: ResponseSnapshot,
    ) {
        if !snapshot.is_storable() {
            return;
        }
        let store = self.store.clone();
        let name = self.config.generation_name(category);
        self.offload.spawn("store_write", async move {
            if let Err(error) = store_snapshot(&store, &name, identity.clone(), snapshot).await {
                debug!(generation = %name, %identity, %error, "Detached store write dropped");
                metrics::record_store_write_error(&name);
            }
        });
    }

    /// Spawns a background refresh of a stored identity.
    ///
    /// Refresh failures are swallowed. Concurrent refreshes of the same
    /// identity may be deduplicated by the offload implementation.
    pub(crate) fn refresh_detached(
        &self,
        request: &InterceptedRequest,
        category: Category,
        identity: RequestIdentity,
    ) {
        let store = self.store.clone();
        let fetch = self.fetch.clone();
        let name = self.config.generation_name(category);
        let request = request.clone();
        let key = identity.clone();
        let spawned = self.offload.spawn_for(key, async move {
            let result = match fetch.fetch(&request).await {
                Ok(snapshot) => store_snapshot(&store, &name, identity.clone(), snapshot)
                    .await
                    .map_err(|error| error.to_string()),
                Err(error) => Err(error.to_string()),
            };
            if let Err(error) = result {
                debug!(%identity, %error, "Background refresh failed");
            }
        });
        if !spawned {
            debug!("Background refresh already in flight");
        }
    }
}

async fn store_snapshot<S>(
    store: &S,
    generation: &str,
    identity: RequestIdentity,
    snapshot: ResponseSnapshot,
) -> Result<(), StoreError>
where
    S: ArtifactStore,
{
    if !snapshot.is_storable() {
        debug!(%identity, status = %snapshot.status(), "Response not stored");
        return Ok(());
    }
    let generation = store.open(generation).await?;
    store.put(&generation, identity, snapshot).await
}
