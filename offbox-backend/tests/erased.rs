//! Stores used through trait objects.

mod common;

use std::sync::Arc;

use common::failing_store::FailingStore;
use common::{identity, snapshot};
use offbox_backend::{ArtifactStore, MemoryStore, StoreError};

async fn roundtrip(store: &dyn ArtifactStore) -> Vec<String> {
    let generation = store.open("erased").await.unwrap();
    store
        .put(&generation, identity("/a"), snapshot("a"))
        .await
        .unwrap();
    store.list_generations().await.unwrap()
}

#[tokio::test]
async fn boxed_store() {
    let store: Box<dyn ArtifactStore> = Box::new(MemoryStore::new());
    assert_eq!(roundtrip(&*store).await, vec!["erased"]);
    assert_eq!(store.name(), "memory");
}

#[tokio::test]
async fn arc_store_shares_state() {
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new());
    let clone = Arc::clone(&store);
    roundtrip(&*store).await;

    let generation = clone.open("erased").await.unwrap();
    let stored = clone.get(&generation, &identity("/a")).await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn failing_store_reports_internal_errors() {
    let store: Arc<dyn ArtifactStore> = Arc::new(FailingStore);
    let err = store.open("any").await.unwrap_err();
    assert!(matches!(err, StoreError::InternalError(_)));
    assert_eq!(store.name(), "failing");
}
