//! Deferred writes: enqueue on failure, FIFO replay, retention on failure.

mod common;

use std::time::Duration;

use common::*;
use http::StatusCode;
use offbox::{
    DeferredQueue, Message, ReplayBackoff, ReplayOutcome, Reply, Signal, Source,
};

async fn enqueue(queue: &DeferredQueue, url: &str, body: &'static str) -> u64 {
    let request = post(url, body);
    queue.enqueue(request.identity(&[]), request).await
}

#[tokio::test]
async fn failed_write_is_queued_and_acknowledged() {
    let h = active_harness().await;
    h.fetch.set_offline(true);

    let served = served(
        h.worker
            .handle(Signal::Fetch(post(&format!("{API}/orders"), r#"{"sku":"A1"}"#)))
            .await
            .unwrap(),
    );
    assert_eq!(served.source, Source::Queued);
    assert_eq!(served.response.status(), StatusCode::ACCEPTED);
    let json: serde_json::Value = serde_json::from_slice(served.response.body()).unwrap();
    assert_eq!(json["queued"], true);
    assert_eq!(json["id"], 1);

    let items = h.worker.queue().items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].request().body().as_ref(), br#"{"sku":"A1"}"#);
    assert_eq!(items[0].attempts(), 0);
}

#[tokio::test]
async fn failed_write_outside_write_routes_is_not_queued() {
    let h = active_harness().await;
    h.fetch.set_offline(true);

    let result = h
        .worker
        .handle(Signal::Fetch(post(&format!("{API}/feedback"), "meh")))
        .await;
    assert!(result.is_err());
    assert!(h.worker.queue().is_empty().await);
}

#[tokio::test]
async fn successful_replay_removes_exactly_one_item() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    let url = format!("{API}/orders");
    fetch.respond(&url, StatusCode::CREATED, "{}");
    fetch.break_url(&format!("{API}/orders/late"));
    enqueue(&queue, &url, "A1").await;
    enqueue(&queue, &format!("{API}/orders/late"), "B2").await;

    let before = queue.len().await;
    let summary = queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(summary.delivered_count(), 1);
    assert_eq!(queue.len().await, before - 1);
    assert_eq!(queue.items().await[0].id(), 2);
}

#[tokio::test]
async fn failed_replay_keeps_item_and_counts_attempt() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    fetch.set_offline(true);
    let url = format!("{API}/orders");
    enqueue(&queue, &url, "x").await;

    let before = queue.len().await;
    let summary = queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(queue.len().await, before);
    let item = &queue.items().await[0];
    assert_eq!(item.attempts(), 1);
    assert!(item.last_attempt_at().is_some());
}

#[tokio::test]
async fn non_success_answers_keep_the_item() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    let statuses = [
        StatusCode::BAD_GATEWAY,
        StatusCode::REQUEST_TIMEOUT,
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::UNPROCESSABLE_ENTITY,
    ];
    for (index, status) in statuses.into_iter().enumerate() {
        let url = format!("{API}/orders/{index}");
        fetch.respond(&url, status, "");
        enqueue(&queue, &url, "order").await;
    }

    let summary = queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(summary.failed_count(), 4);
    assert_eq!(summary.delivered_count(), 0);
    assert!(matches!(summary.outcomes[2], ReplayOutcome::Failed { id: 3, ref error } if error.contains("429")));
    assert_eq!(summary.remaining, 4);
    assert!(queue.items().await.iter().all(|item| item.attempts() == 1));
}

#[tokio::test]
async fn rate_limited_order_is_delivered_on_a_later_drain() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    let url = format!("{API}/orders/new");
    fetch.respond(&url, StatusCode::TOO_MANY_REQUESTS, "");
    enqueue(&queue, &url, r#"{"sku":"A1"}"#).await;

    queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(queue.len().await, 1);

    fetch.respond(&url, StatusCode::CREATED, "{}");
    let summary = queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(summary.delivered_count(), 1);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn replay_is_fifo_and_never_merges_equal_identities() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    let url = format!("{API}/orders");
    fetch.respond(&url, StatusCode::OK, "{}");
    for body in ["first", "second", "third"] {
        enqueue(&queue, &url, body).await;
    }
    let identities: Vec<_> = queue.items().await.iter().map(|item| item.identity().clone()).collect();
    assert!(identities.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(queue.len().await, 3);

    let summary = queue.drain(&fetch, &ReplayBackoff::none()).await;
    let ids: Vec<u64> = summary.delivered().map(|(id, _)| id).collect();
    assert_eq!(ids, [1, 2, 3]);
    assert_eq!(fetch.calls(&url), 3);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn each_drain_attempts_an_item_at_most_once() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    fetch.set_offline(true);
    let url = format!("{API}/orders");
    enqueue(&queue, &url, "x").await;

    queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(fetch.total_calls(), 1);
    queue.drain(&fetch, &ReplayBackoff::none()).await;
    assert_eq!(fetch.total_calls(), 2);
    assert_eq!(queue.items().await[0].attempts(), 2);
}

#[tokio::test]
async fn backoff_skips_recently_failed_items() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    fetch.set_offline(true);
    let url = format!("{API}/orders");
    enqueue(&queue, &url, "x").await;
    let backoff = ReplayBackoff {
        step: Duration::from_secs(60),
        max: Duration::from_secs(600),
    };

    let first = queue.drain(&fetch, &backoff).await;
    assert_eq!(first.failed_count(), 1);
    let second = queue.drain(&fetch, &backoff).await;
    assert!(second.outcomes.is_empty());
    assert_eq!(second.skipped, 1);
    assert_eq!(fetch.total_calls(), 1);
}

#[tokio::test]
async fn concurrent_drains_deliver_each_item_once() {
    let queue = DeferredQueue::new();
    let fetch = MockFetch::new();
    let url = format!("{API}/orders");
    fetch.respond(&url, StatusCode::OK, "{}");
    for body in ["a", "b", "c", "d"] {
        enqueue(&queue, &url, body).await;
    }

    let backoff = ReplayBackoff::none();
    let (left, right) = tokio::join!(queue.drain(&fetch, &backoff), queue.drain(&fetch, &backoff));
    assert_eq!(left.delivered_count() + right.delivered_count(), 4);
    assert_eq!(fetch.calls(&url), 4);
}

#[tokio::test]
async fn replay_message_delivers_and_notifies() {
    let h = active_harness().await;
    h.fetch.set_offline(true);
    h.worker
        .handle(Signal::Fetch(post(&format!("{API}/orders"), "A1")))
        .await
        .unwrap();

    h.fetch.set_offline(false);
    h.fetch
        .respond(&format!("{API}/orders"), StatusCode::CREATED, "{}");
    let reply = h.worker.handle(Message::ReplayWrites.into()).await.unwrap();
    let Reply::Replayed(summary) = reply else {
        panic!("expected replay summary");
    };
    assert_eq!(summary.delivered_count(), 1);
    assert!(h.worker.queue().is_empty().await);
    assert_eq!(h.notifier.titles(), ["Sync complete"]);
}

#[tokio::test]
async fn failed_replay_does_not_notify() {
    let h = active_harness().await;
    h.fetch.set_offline(true);
    h.worker
        .handle(Signal::Fetch(post(&format!("{API}/orders"), "A1")))
        .await
        .unwrap();

    h.worker
        .handle(Signal::Periodic("deferred-writes".to_owned()))
        .await
        .unwrap();
    assert_eq!(h.worker.queue().len().await, 1);
    assert!(h.notifier.shown().is_empty());
}
