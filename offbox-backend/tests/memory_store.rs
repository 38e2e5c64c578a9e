mod common;

use std::sync::Arc;

use common::{identity, snapshot};
use offbox_backend::{ArtifactStore, DeleteStatus, MemoryStore, StoreError};

#[tokio::test]
async fn put_then_get_returns_the_same_snapshot() {
    let store = MemoryStore::new();
    let generation = store.open("app-pages-v1").await.unwrap();
    let key = identity("/card.html?id=42");

    store
        .put(&generation, key.clone(), snapshot("<html>A</html>"))
        .await
        .unwrap();

    let stored = store.get(&generation, &key).await.unwrap().unwrap();
    assert_eq!(stored.body().as_ref(), b"<html>A</html>");
}

#[tokio::test]
async fn generations_are_isolated() {
    let store = MemoryStore::new();
    let v1 = store.open("app-static-v1").await.unwrap();
    let v2 = store.open("app-static-v2").await.unwrap();
    let key = identity("/app.js");

    store.put(&v1, key.clone(), snapshot("v1")).await.unwrap();

    assert!(store.get(&v2, &key).await.unwrap().is_none());
    assert_eq!(store.list_keys(&v1).await.unwrap(), vec![key]);
}

#[tokio::test]
async fn open_is_idempotent() {
    let store = MemoryStore::new();
    let first = store.open("app-api-v1").await.unwrap();
    store.put(&first, identity("/x"), snapshot("x")).await.unwrap();

    let again = store.open("app-api-v1").await.unwrap();
    assert_eq!(first, again);
    assert_eq!(store.list_keys(&again).await.unwrap().len(), 1);
}

#[tokio::test]
async fn last_write_wins() {
    let store = MemoryStore::new();
    let generation = store.open("g").await.unwrap();
    let key = identity("/a");

    store.put(&generation, key.clone(), snapshot("first")).await.unwrap();
    store.put(&generation, key.clone(), snapshot("second")).await.unwrap();

    let stored = store.get(&generation, &key).await.unwrap().unwrap();
    assert_eq!(stored.body().as_ref(), b"second");
}

#[tokio::test]
async fn delete_generation_removes_everything() {
    let store = MemoryStore::new();
    let generation = store.open("old").await.unwrap();
    store.put(&generation, identity("/a"), snapshot("a")).await.unwrap();
    store.put(&generation, identity("/b"), snapshot("b")).await.unwrap();
    store.open("current").await.unwrap();

    assert_eq!(
        store.delete_generation("old").await.unwrap(),
        DeleteStatus::Deleted(2)
    );
    assert_eq!(store.delete_generation("old").await.unwrap(), DeleteStatus::Missing);
    assert_eq!(store.list_generations().await.unwrap(), vec!["current"]);

    let err = store.get(&generation, &identity("/a")).await.unwrap_err();
    assert!(matches!(err, StoreError::GenerationMissing(name) if name == "old"));
}

#[tokio::test]
async fn delete_entry_reports_status() {
    let store = MemoryStore::new();
    let generation = store.open("g").await.unwrap();
    let key = identity("/a");
    store.put(&generation, key.clone(), snapshot("a")).await.unwrap();

    assert_eq!(
        store.delete_entry(&generation, &key).await.unwrap(),
        DeleteStatus::Deleted(1)
    );
    assert_eq!(
        store.delete_entry(&generation, &key).await.unwrap(),
        DeleteStatus::Missing
    );
}

#[tokio::test]
async fn concurrent_writers_do_not_lose_distinct_keys() {
    let store = Arc::new(MemoryStore::new());
    let generation = store.open("g").await.unwrap();

    let writes = (0..32).map(|i| {
        let store = Arc::clone(&store);
        let generation = generation.clone();
        tokio::spawn(async move {
            store
                .put(&generation, identity(&format!("/item/{i}")), snapshot("x"))
                .await
                .unwrap();
        })
    });
    futures::future::join_all(writes).await;

    assert_eq!(store.list_keys(&generation).await.unwrap().len(), 32);
    assert_eq!(store.entry_count(), 32);
}
