use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use offbox_core::{RequestIdentity, ResponseSnapshot};
use smol_str::SmolStr;

use crate::{DeleteStatus, StoreError};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to an opened generation.
///
/// Obtained from [`ArtifactStore::open`]. The handle only names the
/// generation; if the generation is deleted afterwards, operations through
/// the handle fail with [`StoreError::GenerationMissing`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation {
    name: SmolStr,
}

impl Generation {
    /// Creates a handle. Stores call this from [`ArtifactStore::open`].
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the generation name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Versioned key-value store of request identities to response snapshots.
///
/// Entries live in named generations that are created with [`open`],
/// enumerated with [`list_generations`] and deleted wholesale with
/// [`delete_generation`]. Implementations must tolerate concurrent reads and
/// writes; concurrent writes to the same identity are last-write-wins.
///
/// [`open`]: ArtifactStore::open
/// [`list_generations`]: ArtifactStore::list_generations
/// [`delete_generation`]: ArtifactStore::delete_generation
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Opens a generation, creating it if it does not exist.
    async fn open(&self, name: &str) -> StoreResult<Generation>;

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>>;

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()>;

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus>;

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>>;

    /// Names of all existing generations, sorted.
    async fn list_generations(&self) -> StoreResult<Vec<String>>;

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus>;

    /// Returns the name of this store for logs and metrics.
    fn name(&self) -> &str {
        "store"
    }
}

#[async_trait]
impl ArtifactStore for &dyn ArtifactStore {
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        (*self).open(name).await
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        (*self).get(generation, key).await
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (*self).put(generation, key, value).await
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        (*self).delete_entry(generation, key).await
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        (*self).list_keys(generation).await
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        (*self).list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus> {
        (*self).delete_generation(name).await
    }

    fn name(&self) -> &str {
        (*self).name()
    }
}

#[async_trait]
impl ArtifactStore for Box<dyn ArtifactStore> {
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        (**self).open(name).await
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        (**self).get(generation, key).await
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (**self).put(generation, key, value).await
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        (**self).delete_entry(generation, key).await
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        (**self).list_keys(generation).await
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        (**self).list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus> {
        (**self).delete_generation(name).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T> ArtifactStore for Arc<T>
where
    T: ArtifactStore + ?Sized,
{
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        (**self).open(name).await
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        (**self).get(generation, key).await
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (**self).put(generation, key, value).await
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        (**self).delete_entry(generation, key).await
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        (**self).list_keys(generation).await
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        (**self).list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus> {
        (**self).delete_generation(name).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
