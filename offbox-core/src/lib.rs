#![warn(missing_docs)]
//! # offbox-core
//!
//! Core types and traits shared by the offbox crates.
//!
//! This crate holds the data model the orchestration engine works on and the
//! capabilities it consumes:
//!
//! - **Identify** requests for storage ([`RequestIdentity`])
//! - **Capture** responses ([`ResponseSnapshot`])
//! - **Classify** traffic ([`TrafficClass`], [`Category`], [`Strategy`])
//! - **Reach** the network ([`Fetch`])
//! - **Execute** background tasks ([`Offload`])

pub mod class;
pub mod fetch;
pub mod identity;
pub mod offload;
pub mod request;
pub mod snapshot;

pub use class::{Category, Strategy, TrafficClass};
pub use fetch::{Fetch, FetchError};
pub use identity::RequestIdentity;
pub use offload::Offload;
pub use request::{Destination, InterceptedRequest};
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use snapshot::ResponseSnapshot;
