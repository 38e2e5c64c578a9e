//! Scripted network for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use offbox_core::identity::normalize_url;
use offbox_core::{Fetch, FetchError, InterceptedRequest, ResponseSnapshot};
use tokio::sync::Semaphore;

#[derive(Default)]
struct Inner {
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    unreachable: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Network answering from a route table.
///
/// Unknown URLs answer `404`. The whole network or single URLs can be made
/// unreachable, and responses can be held back until released.
#[derive(Clone, Default)]
pub struct MockFetch {
    inner: Arc<Inner>,
}

impl MockFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `url` (any method) with a status and body.
    pub fn respond(&self, url: &str, status: StatusCode, body: impl Into<Bytes>) {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(normalize(url), (status, body.into()));
    }

    /// Takes the whole network down or brings it back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes a single URL unreachable.
    pub fn break_url(&self, url: &str) {
        self.inner.unreachable.lock().unwrap().push(normalize(url));
    }

    /// Holds every response until [`MockFetch::release`] is called.
    pub fn hold(&self) {
        *self.inner.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets held responses through.
    pub fn release(&self) {
        if let Some(gate) = self.inner.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS);
        }
    }

    /// Number of fetches of `url`.
    pub fn calls(&self, url: &str) -> usize {
        let url = normalize(url);
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| **called == url)
            .count()
    }

    /// Total number of fetches.
    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }
}

fn normalize(url: &str) -> String {
    normalize_url(&url.parse().unwrap())
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError> {
        let url = normalize_url(request.uri());
        self.inner.calls.lock().unwrap().push(url.clone());

        let gate = self.inner.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        if self.inner.offline.load(Ordering::SeqCst)
            || self.inner.unreachable.lock().unwrap().contains(&url)
        {
            return Err(FetchError::Unreachable(url));
        }

        let route = self.inner.routes.lock().unwrap().get(&url).cloned();
        Ok(match route {
            Some((status, body)) => ResponseSnapshot::new(status, HeaderMap::new(), body),
            None => ResponseSnapshot::new(StatusCode::NOT_FOUND, HeaderMap::new(), ""),
        })
    }
}
