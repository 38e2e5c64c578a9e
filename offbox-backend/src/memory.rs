//! In-memory artifact store backed by `DashMap`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use offbox_core::{RequestIdentity, ResponseSnapshot};
use smol_str::SmolStr;

use crate::{ArtifactStore, DeleteStatus, Generation, StoreError, StoreResult};

type Entries = Arc<DashMap<RequestIdentity, ResponseSnapshot>>;

/// Thread-safe in-memory store.
///
/// Cloning is cheap and all clones share the same generations.
///
/// ```
/// use offbox_backend::{ArtifactStore, MemoryStore};
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.open("app-static-v1").await.unwrap();
/// assert_eq!(store.list_generations().await.unwrap(), vec!["app-static-v1"]);
/// # }
/// ```
#[derive(Clone, Default, Debug)]
pub struct MemoryStore {
    generations: Arc<DashMap<SmolStr, Entries>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every generation.
    pub fn clear(&self) {
        self.generations.clear();
    }

    /// Total number of entries across all generations.
    pub fn entry_count(&self) -> usize {
        self.generations.iter().map(|g| g.value().len()).sum()
    }

    fn entries(&self, generation: &Generation) -> StoreResult<Entries> {
        self.generations
            .get(generation.name())
            .map(|entries| Arc::clone(entries.value()))
            .ok_or_else(|| StoreError::GenerationMissing(generation.name().to_owned()))
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        self.generations.entry(SmolStr::new(name)).or_default();
        Ok(Generation::new(name))
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        Ok(self.entries(generation)?.get(key).map(|v| v.clone()))
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        self.entries(generation)?.insert(key, value);
        Ok(())
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        Ok(match self.entries(generation)?.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        Ok(self
            .entries(generation)?
            .iter()
            .map(|entry| entry.key().clone())
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
        Ok(match self.generations.remove(name) {
            Some((_, entries)) => DeleteStatus::Deleted(entries.len() as u32),
            None => DeleteStatus::Missing,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
