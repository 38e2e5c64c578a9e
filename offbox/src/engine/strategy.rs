use offbox_backend::ArtifactStore;
use offbox_core::{
    Category, Fetch, FetchError, InterceptedRequest, Offload, RequestIdentity, TrafficClass,
};
use tracing::debug;

use super::{Served, Source, StrategyEngine};
use crate::fallback;

impl<S, F, O> StrategyEngine<S, F, O>
where
    S: ArtifactStore + Clone + 'static,
    F: Fetch + Clone + 'static,
    O: Offload + 'static,
{
    pub(super) async fn store_first(
        &self,
        request: &InterceptedRequest,
        class: TrafficClass,
    ) -> Result<Served, FetchError> {
        let category = class.category();
        let identity = self.identity(request);
        if let Some(stored) = self.lookup(category, &identity).await {
            self.refresh_detached(request, category, identity);
            return Ok(Served::new(stored, Source::Store, class));
        }
        match self.fetch.fetch(request).await {
            Ok(response) => {
                self.remember(category, identity, response.clone()).await;
                Ok(Served::new(response, Source::Network, class))
            }
            Err(error) if request.is_navigation() => {
                debug!(%error, "Network failed for uncached navigation, serving offline page");
                Ok(Served::new(
                    fallback::offline_page(self.config()),
                    Source::Offline,
                    class,
                ))
            }
            Err(error) => Err(error),
        }
    }

    pub(super) async fn network_first(
        &self,
        request: &InterceptedRequest,
        class: TrafficClass,
    ) -> Result<Served, FetchError> {
        let category = class.category();
        let identity = self.identity(request);
        let error = match self.fetch.fetch(request).await {
            Ok(response) => {
                self.remember(category, identity, response.clone()).await;
                return Ok(Served::new(response, Source::Network, class));
            }
            Err(error) => error,
        };
        debug!(%error, "Network failed, trying store");

        if let Some(stored) = self.lookup(category, &identity).await {
            return Ok(Served::new(stored, Source::Store, class));
        }

        match class {
            TrafficClass::ApiCall => Ok(Served::new(
                fallback::service_unavailable(),
                Source::Unavailable,
                class,
            )),
            TrafficClass::DynamicPage => Ok(self.page_substitute(class).await),
            _ if request.is_navigation() => Ok(self.page_substitute(class).await),
            _ => Err(error),
        }
    }

    pub(super) async fn network_first_detached_write(
        &self,
        request: &InterceptedRequest,
        class: TrafficClass,
    ) -> Result<Served, FetchError> {
        let category = class.category();
        let identity = self.identity(request);
        match self.fetch.fetch(request).await {
            Ok(response) => {
                self.remember_detached(category, identity, response.clone());
                Ok(Served::new(response, Source::Network, class))
            }
            Err(error) => match self.lookup(category, &identity).await {
                Some(stored) => Ok(Served::new(stored, Source::Store, class)),
                None => Err(error),
            },
        }
    }

    pub(super) async fn store_first_with_placeholder(
        &self,
        request: &InterceptedRequest,
        class: TrafficClass,
    ) -> Result<Served, FetchError> {
        let category = class.category();
        let identity = self.identity(request);
        if let Some(stored) = self.lookup(category, &identity).await {
            return Ok(Served::new(stored, Source::Store, class));
        }
        match self.fetch.fetch(request).await {
            Ok(response) => {
                self.remember(category, identity, response.clone()).await;
                Ok(Served::new(response, Source::Network, class))
            }
            Err(error) => {
                debug!(%error, "Image unavailable, serving placeholder");
                Ok(Served::new(
                    fallback::placeholder_image(self.config()),
                    Source::Placeholder,
                    class,
                ))
            }
        }
    }

    /// Stored fallback page, or the synthesized offline page.
    async fn page_substitute(&self, class: TrafficClass) -> Served {
        let fallback_identity = self
            .config()
            .fallback_page
            .as_deref()
            .and_then(|path| self.config().asset_uri(path).ok())
            .map(|uri| {
                RequestIdentity::new(
                    &http::Method::GET,
                    &uri,
                    &http::HeaderMap::new(),
                    &self.config().vary_headers,
                )
            });
        if let Some(identity) = fallback_identity
            && let Some(stored) = self.lookup(Category::Static, &identity).await
        {
            return Served::new(stored, Source::Fallback, class);
        }
        Served::new(
            fallback::offline_page(self.config()),
            Source::Offline,
            class,
        )
    }
}
