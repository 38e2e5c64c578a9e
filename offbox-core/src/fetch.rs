//! Network fetch capability.
//!
//! The transport used to reach the network is opaque to the orchestrator.
//! Anything implementing [`Fetch`] can be plugged in: a real HTTP client,
//! an in-process router, or a scripted mock in tests.
//!
//! ```rust,ignore
//! use offbox_core::{Fetch, FetchError, InterceptedRequest, ResponseSnapshot};
//!
//! struct Offline;
//!
//! #[async_trait::async_trait]
//! impl Fetch for Offline {
//!     async fn fetch(&self, _req: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError> {
//!         Err(FetchError::Unreachable("no route".into()))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{InterceptedRequest, ResponseSnapshot};

/// Network failure. Always recoverable from the orchestrator's point of view.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The network could not be reached at all.
    #[error("network unreachable: {0}")]
    Unreachable(String),
    /// The transport reported an error (timeout, reset, TLS, ...).
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

/// Performs network calls for intercepted requests.
///
/// A non-2xx response is still a successful fetch; only transport failures
/// are reported as [`FetchError`]. Timeouts are the implementation's own.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Sends the request to the network.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError>;
}

#[async_trait]
impl<T> Fetch for Arc<T>
where
    T: Fetch + ?Sized,
{
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl Fetch for Box<dyn Fetch> {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, FetchError> {
        (**self).fetch(request).await
    }
}
