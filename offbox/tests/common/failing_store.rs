//! Store wrapper whose reads or writes can be made to fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use offbox_backend::{
    ArtifactStore, DeleteStatus, Generation, MemoryStore, StoreError, StoreResult,
};
use offbox_core::{RequestIdentity, ResponseSnapshot};

fn simulated() -> StoreError {
    StoreError::InternalError(Box::new(std::io::Error::other("simulated error")))
}

#[derive(Default)]
struct Switches {
    reads: AtomicBool,
    writes: AtomicBool,
}

/// [`MemoryStore`] with switchable failures.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Arc<Switches>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    /// Makes `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.failing.reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `open`, `put` and deletions fail.
    pub fn fail_writes(&self, fail: bool) {
        self.failing.writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, switch: &AtomicBool) -> StoreResult<()> {
        if switch.load(Ordering::SeqCst) {
            Err(simulated())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn open(&self, name: &str) -> StoreResult<Generation> {
        self.check(&self.failing.writes)?;
        self.inner.open(name).await
    }

    async fn get(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<Option<ResponseSnapshot>> {
        self.check(&self.failing.reads)?;
        self.inner.get(generation, key).await
    }

    async fn put(
        &self,
        generation: &Generation,
        key: RequestIdentity,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        self.check(&self.failing.writes)?;
        self.inner.put(generation, key, value).await
    }

    async fn delete_entry(
        &self,
        generation: &Generation,
        key: &RequestIdentity,
    ) -> StoreResult<DeleteStatus> {
        self.check(&self.failing.writes)?;
        self.inner.delete_entry(generation, key).await
    }

    async fn list_keys(&self, generation: &Generation) -> StoreResult<Vec<RequestIdentity>> {
        self.check(&self.failing.reads)?;
        self.inner.list_keys(generation).await
    }

    async fn list_generations(&self) -> StoreResult<Vec<String>> {
        self.inner.list_generations().await
    }

    async fn delete_generation(&self, name: &str) -> StoreResult<DeleteStatus> {
        self.check(&self.failing.writes)?;
        self.inner.delete_generation(name).await
    }

    fn name(&self) -> &str {
        "failing"
    }
}
