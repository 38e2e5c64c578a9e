#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! Moka-backed [`ArtifactStore`](offbox_backend::ArtifactStore) for offbox.
//!
//! Each generation is an independent bounded Moka cache.

mod builder;
pub mod metrics;
mod store;

pub use builder::{ByteCapacity, EntryCapacity, MokaStoreBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
pub use store::MokaStore;
