//! Offload manager for detached background tasks.
//!
//! Store-first serving refreshes stored copies in the background, and
//! external resources are written to the store off the response path. Both
//! run through the [`OffloadManager`], which records tasks for observability
//! and never awaits or cancels them on behalf of the caller.
//!
//! # Example
//!
//! ```ignore
//! use offbox::offload::{OffloadConfig, OffloadManager};
//!
//! let manager = OffloadManager::new(OffloadConfig::default());
//! manager.spawn("store_write", async {
//!     // write to the artifact store
//! });
//! ```

mod manager;
mod policy;

pub use manager::{OffloadKey, OffloadManager};
pub use policy::{OffloadConfig, OffloadConfigBuilder, SlowTaskPolicy};
