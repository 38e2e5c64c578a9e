pub mod failing_store;

use http::{HeaderMap, StatusCode};
use offbox_core::{RequestIdentity, ResponseSnapshot};

pub fn identity(path: &str) -> RequestIdentity {
    RequestIdentity::get(&format!("https://app.test{path}").parse().unwrap())
}

pub fn snapshot(body: &'static str) -> ResponseSnapshot {
    ResponseSnapshot::new(StatusCode::OK, HeaderMap::new(), body)
}
