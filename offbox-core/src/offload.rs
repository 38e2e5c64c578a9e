//! Offload trait for background task execution.
//!
//! Background refreshes of stored assets and detached store writes must never
//! hold up the response path. The [`Offload`] trait abstracts over how those
//! tasks are spawned.

use std::future::Future;

use smol_str::SmolStr;

use crate::RequestIdentity;

/// Trait for spawning detached background tasks.
///
/// Spawned tasks are never cancelled: once started they run to completion or
/// failure independently of the request that triggered them.
///
/// # Clone bound
///
/// Implementors should use `Arc` internally so that all clones share the
/// same task registry.
///
/// # Example
///
/// ```ignore
/// use offbox_core::Offload;
///
/// fn offload_store_write<O: Offload>(offload: &O) {
///     offload.spawn("store_write", async move {
///         // write to the artifact store
///     });
/// }
/// ```
pub trait Offload: Send + Sync + Clone {
    /// Spawn a future to be executed in the background.
    ///
    /// * `kind` - Label categorizing the task (e.g. "refresh", "store_write").
    ///   Used for metrics and tracing.
    /// * `future` - The task itself.
    fn spawn<F>(&self, kind: impl Into<SmolStr>, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Spawn a task tied to a request identity.
    ///
    /// Implementations may skip the task when one for the same identity is
    /// still in flight. Returns `true` if the task was spawned.
    fn spawn_for<F>(&self, identity: RequestIdentity, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let _ = identity;
        self.spawn("refresh", future);
        true
    }
}
