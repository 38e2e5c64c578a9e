#![allow(dead_code)]

pub mod failing_store;
pub mod mock_fetch;
pub mod recorder;

use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use offbox::{OfflineConfig, Reply, Served, ServiceWorker, Signal, WriteRoute};
use offbox_backend::MemoryStore;
use offbox_core::{Destination, InterceptedRequest};

pub use failing_store::FailingStore;
pub use mock_fetch::MockFetch;
pub use recorder::{RecordingNotifier, RecordingViews};

pub const ORIGIN: &str = "https://shop.test";
pub const API: &str = "https://api.shop.test";

pub type TestWorker = ServiceWorker<MemoryStore, MockFetch, RecordingNotifier, RecordingViews>;

/// Configuration of a small shop application.
pub fn shop_config(version: &str) -> OfflineConfig {
    OfflineConfig::builder(version, ORIGIN)
        .prefix("shop")
        .api_host("api.shop.test")
        .essential_assets(["/", "/app.js", "/style.css", "/offline.html", "/card.html"])
        .page_template("/card.html", "id")
        .fallback_page("/offline.html")
        .media_host("images.shop.test")
        .external_host("gstatic.com")
        .write_route(WriteRoute::new("/orders"))
        .build()
        .unwrap()
}

/// Network answering every essential asset of [`shop_config`].
pub fn shop_network() -> MockFetch {
    let fetch = MockFetch::new();
    fetch.respond(&format!("{ORIGIN}/"), StatusCode::OK, "<html>home</html>");
    fetch.respond(&format!("{ORIGIN}/app.js"), StatusCode::OK, "console.log(1)");
    fetch.respond(&format!("{ORIGIN}/style.css"), StatusCode::OK, "body{}");
    fetch.respond(&format!("{ORIGIN}/offline.html"), StatusCode::OK, "<html>fallback</html>");
    fetch.respond(&format!("{ORIGIN}/card.html"), StatusCode::OK, "<html>card</html>");
    fetch
}

pub struct Harness {
    pub worker: TestWorker,
    pub store: MemoryStore,
    pub fetch: MockFetch,
    pub notifier: RecordingNotifier,
    pub views: RecordingViews,
}

/// Worker for [`shop_config`] `v1`, not installed yet.
pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let fetch = shop_network();
    let notifier = RecordingNotifier::default();
    let views = RecordingViews::default();
    let worker = ServiceWorker::new(
        shop_config("v1"),
        store.clone(),
        fetch.clone(),
        notifier.clone(),
        views.clone(),
    );
    Harness {
        worker,
        store,
        fetch,
        notifier,
        views,
    }
}

/// Worker with `v1` installed and active.
pub async fn active_harness() -> Harness {
    let harness = harness();
    harness.worker.handle(Signal::Install).await.unwrap();
    harness.worker.handle(Signal::Activate).await.unwrap();
    harness
}

pub fn get(url: &str) -> InterceptedRequest {
    InterceptedRequest::get(url.parse::<Uri>().unwrap())
}

pub fn navigate(url: &str) -> InterceptedRequest {
    get(url).with_destination(Destination::Document)
}

pub fn image(url: &str) -> InterceptedRequest {
    get(url).with_destination(Destination::Image)
}

pub fn post(url: &str, body: &'static str) -> InterceptedRequest {
    InterceptedRequest::new(Method::POST, url.parse::<Uri>().unwrap()).with_body(Bytes::from(body))
}

pub fn served(reply: Reply) -> Served {
    match reply {
        Reply::Served(served) => served,
        other => panic!("expected a served response, got {other:?}"),
    }
}

pub fn body(served: &Served) -> String {
    String::from_utf8_lossy(served.response.body()).into_owned()
}
