//! Synthesized responses served when neither network nor store can answer.

use http::StatusCode;
use offbox_core::ResponseSnapshot;

use crate::OfflineConfig;

/// Body of the API unavailable response.
pub const SERVICE_UNAVAILABLE_BODY: &str = r#"{"error":"Service unavailable","offline":true}"#;

/// Offline page served to navigations.
pub fn offline_page(config: &OfflineConfig) -> ResponseSnapshot {
    ResponseSnapshot::synthetic(
        StatusCode::OK,
        "text/html; charset=utf-8",
        config.offline_page.clone(),
    )
}

/// Placeholder served for images.
pub fn placeholder_image(config: &OfflineConfig) -> ResponseSnapshot {
    ResponseSnapshot::synthetic(StatusCode::OK, "image/svg+xml", config.placeholder_svg.clone())
}

/// `503` JSON served for API calls.
pub fn service_unavailable() -> ResponseSnapshot {
    ResponseSnapshot::synthetic(
        StatusCode::SERVICE_UNAVAILABLE,
        "application/json",
        SERVICE_UNAVAILABLE_BODY,
    )
}

/// `202` JSON acknowledging a deferred write.
pub fn queued(id: u64) -> ResponseSnapshot {
    ResponseSnapshot::synthetic(
        StatusCode::ACCEPTED,
        "application/json",
        serde_json::json!({ "queued": true, "id": id }).to_string(),
    )
}
