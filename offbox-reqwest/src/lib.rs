#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! [`Fetch`](offbox_core::Fetch) implementation on top of reqwest.
//!
//! [`ReqwestFetch`] sends intercepted requests through a
//! `reqwest-middleware` client, so retry, tracing or auth middleware can be
//! stacked in front of the network:
//!
//! ```no_run
//! use offbox_reqwest::ReqwestFetch;
//! use std::time::Duration;
//!
//! let fetch = ReqwestFetch::new(reqwest::Client::new()).timeout(Duration::from_secs(10));
//! ```

mod fetch;

pub use fetch::ReqwestFetch;

/// Re-export of the middleware client type accepted by [`ReqwestFetch::with_middleware`].
pub use reqwest_middleware::ClientWithMiddleware;
