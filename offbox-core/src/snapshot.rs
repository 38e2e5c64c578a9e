//! Captured responses.
//!
//! A [`ResponseSnapshot`] is an immutable capture of a response at a point in
//! time: status, headers, body bytes and the retrieval timestamp. Stored
//! snapshots are never modified, only deleted as a whole.
//!
//! ```
//! use offbox_core::ResponseSnapshot;
//! use http::StatusCode;
//!
//! let snapshot = ResponseSnapshot::new(StatusCode::OK, Default::default(), "<html>A</html>");
//! assert!(snapshot.is_storable());
//! assert_eq!(snapshot.body().as_ref(), b"<html>A</html>");
//! ```

use std::mem::size_of;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, StatusCode, header};

/// Immutable capture of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    fetched_at: DateTime<Utc>,
}

impl ResponseSnapshot {
    /// Captures a response now.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self::captured_at(status, headers, body, Utc::now())
    }

    /// Captures a response with an explicit retrieval timestamp.
    pub fn captured_at(
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            fetched_at,
        }
    }

    /// Builds a synthetic response with a single `content-type` header.
    pub fn synthetic(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::new(status, headers, body)
    }

    /// Returns the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body bytes.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns when the response was retrieved.
    #[inline]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Returns the `content-type` header, if readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Only successful retrievals (2xx) may be stored.
    pub fn is_storable(&self) -> bool {
        self.status.is_success()
    }

    /// Consumes the snapshot and returns its parts.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Returns the estimated memory usage of this snapshot in bytes.
    pub fn memory_size(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        size_of::<Self>() + headers + self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_is_storable() {
        let ok = ResponseSnapshot::new(StatusCode::NO_CONTENT, HeaderMap::new(), "");
        let redirect = ResponseSnapshot::new(StatusCode::FOUND, HeaderMap::new(), "");
        let error = ResponseSnapshot::new(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), "");
        assert!(ok.is_storable());
        assert!(!redirect.is_storable());
        assert!(!error.is_storable());
    }

    #[test]
    fn synthetic_sets_content_type() {
        let snapshot = ResponseSnapshot::synthetic(StatusCode::OK, "image/svg+xml", "<svg/>");
        assert_eq!(snapshot.content_type(), Some("image/svg+xml"));
    }
}
