//! Store that fails every operation, for error-path tests.

use async_trait::async_trait;
use offbox_backend::{ArtifactStore, DeleteStatus, Generation, StoreError, StoreResult};
use offbox_core::{RequestIdentity, ResponseSnapshot};

fn simulated() -> StoreError {
    StoreError::InternalError(Box::new(std::io::Error::other("simulated error")))
}

/// Store that always returns errors.
#[derive(Clone, Default)]
pub struct FailingStore;

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn open(&self, _name: &str) -> StoreResult<Generation> {
        Err(simulated())
    }

    async fn get(
        &self,
        _generation: &Generation,
        _key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        Err(simulated())
    }

    async fn put(
        &self,
        _generation: &Generation,
        _key: RequestIdentity,
        _value: ResponseSnapshot,
    ) -> StoreResult<()> {
        Err(simulated())
    }

    async fn delete_entry(
        &self,
        _generation: &Generation,
        _key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        Err(simulated())
    }

    async fn list_keys(&self, _generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        Err(simulated())
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        Err(simulated())
    }

    async fn delete_generation(&self, _name: &str) -> StoreResult<DeleteStatus> {
        Err(simulated())
    }

    fn name(&self) -> &str {
        "failing"
    }
}
