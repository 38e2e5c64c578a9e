//! Artifact store trait and in-memory implementation.
//!
//! If you want to implement your own store, you are in the right place:
//! implement [`ArtifactStore`] and hand it to the orchestrator.
mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{ArtifactStore, Generation, StoreResult};

/// Status of a delete operation.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record(s) successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}
