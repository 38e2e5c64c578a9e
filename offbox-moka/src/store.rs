//! Moka store implementation.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use offbox_backend::{ArtifactStore, DeleteStatus, Generation, StoreError, StoreResult};
use offbox_core::{RequestIdentity, ResponseSnapshot};
use smol_str::SmolStr;

use crate::builder::CacheFactory;
use crate::metrics;

pub(crate) type GenerationCache = Cache<RequestIdentity, ResponseSnapshot>;

/// In-memory artifact store powered by Moka.
///
/// Every generation is its own bounded Moka cache, so a busy media
/// generation can never evict application shell assets. Capacity is
/// configured per generation on the [builder](MokaStore::builder).
///
/// # Examples
///
/// ```
/// use offbox_moka::MokaStore;
///
/// let store = MokaStore::builder().max_entries(500).build();
/// ```
///
/// # Caveats
///
/// - Data is **not persisted**, stored artifacts are lost on restart
/// - Capacity eviction is **best-effort**, a generation may briefly exceed its
///   bound until Moka's maintenance runs
#[derive(Clone)]
pub struct MokaStore {
    generations: Arc<DashMap<SmolStr, GenerationCache>>,
    factory: CacheFactory,
    label: SmolStr,
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("generations", &self.generations.len())
            .field("factory", &self.factory)
            .finish()
    }
}

impl MokaStore {
    /// Creates a new builder for `MokaStore`.
    pub fn builder() -> crate::builder::MokaStoreBuilder<crate::builder::NoCapacity> {
        crate::builder::MokaStoreBuilder::new()
    }

    pub(crate) fn from_parts(factory: CacheFactory, label: SmolStr) -> Self {
        Self {
            generations: Arc::new(DashMap::new()),
            factory,
            label,
        }
    }

    /// Returns the cache backing a generation, if it exists.
    ///
    /// Mostly useful in tests to run Moka's pending maintenance.
    pub fn cache(&self, name: &str) -> Option<Cache<RequestIdentity, ResponseSnapshot>> {
        self.generations.get(name).map(|cache| cache.value().clone())
    }

    fn generation(&self, generation: &Generation) -> StoreResult<GenerationCache> {
        self.cache(generation.name())
            .ok_or_else(|| StoreError::GenerationMissing(generation.name().to_owned()))
    }
}

#[async_trait]
impl ArtifactStore for MokaStore {
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        self.generations
            .entry(SmolStr::new(name))
            .or_insert_with(|| self.factory.build());
        Ok(Generation::new(name))
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        Ok(self.generation(generation)?.get(key).await)
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        let cache = self.generation(generation)?;
        cache.insert(key, value).await;
        metrics::record_capacity(
            generation.name(),
            cache.entry_count(),
            cache.weighted_size(),
        );
        Ok(())
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        Ok(match self.generation(generation)?.remove(key).await {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        Ok(self
            .generation(generation)?
            .iter()
            .map(|(key, _)| (*key).clone())
            .collect())
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .generations
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus> {
        match self.generations.remove(name) {
            Some((_, cache)) => {
                let count = cache.iter().count() as u32;
                cache.invalidate_all();
                Ok(DeleteStatus::Deleted(count))
            }
            None => Ok(DeleteStatus::Missing),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}
