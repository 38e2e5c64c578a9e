//! Error types for artifact store operations.

use thiserror::Error;

/// Error type for artifact store operations.
///
/// Store failures are always recoverable for the orchestrator: a failed read
/// is treated as a miss and a failed background write is dropped.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed generation does not exist (never opened, or deleted).
    #[error("generation `{0}` does not exist")]
    GenerationMissing(String),

    /// Internal store error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring while talking to a remote store.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),
}
