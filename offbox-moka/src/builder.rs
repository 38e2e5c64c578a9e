//! Builder for configuring [`MokaStore`].

use moka::future::CacheBuilder;
use moka::policy::EvictionPolicy;
use offbox_core::{RequestIdentity, ResponseSnapshot};
use smol_str::SmolStr;

use crate::store::{GenerationCache, MokaStore};

/// Marker type: capacity has not been configured yet.
///
/// This is the initial state of a [`MokaStoreBuilder`]. You must call either
/// [`max_entries()`](MokaStoreBuilder::max_entries) or
/// [`max_bytes()`](MokaStoreBuilder::max_bytes) before calling `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity per generation has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: byte-based capacity per generation has been configured.
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

#[derive(Debug, Clone, Copy)]
enum Capacity {
    Entries(u64),
    Bytes(u64),
}

/// Recipe for the cache backing each new generation.
#[derive(Clone)]
pub(crate) struct CacheFactory {
    capacity: Capacity,
    eviction_policy: Option<EvictionPolicy>,
}

impl std::fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFactory")
            .field("capacity", &self.capacity)
            .field("custom_eviction_policy", &self.eviction_policy.is_some())
            .finish()
    }
}

impl CacheFactory {
    pub(crate) fn build(&self) -> GenerationCache {
        match self.capacity {
            Capacity::Entries(max) => CacheBuilder::new(max)
                .eviction_policy(
                    self.eviction_policy
                        .clone()
                        .unwrap_or_else(EvictionPolicy::tiny_lfu),
                )
                .build(),
            // TinyLFU admission can reject new entries even when eviction
            // could make room, so weighted caches default to LRU.
            Capacity::Bytes(max) => CacheBuilder::new(max)
                .weigher(byte_weigher)
                .eviction_policy(self.eviction_policy.clone().unwrap_or_else(EvictionPolicy::lru))
                .build(),
        }
    }
}

fn byte_weigher(key: &RequestIdentity, value: &ResponseSnapshot) -> u32 {
    (key.url().len() + value.memory_size()).min(u32::MAX as usize) as u32
}

/// Builder for creating and configuring a [`MokaStore`].
///
/// Use [`MokaStore::builder`] to create a new builder instance.
///
/// # Capacity Configuration (Required)
///
/// Capacity applies to **each generation** and is configured with exactly one of:
/// - [`max_entries(n)`](Self::max_entries) - limit by entry count
/// - [`max_bytes(n)`](Self::max_bytes) - limit by approximate memory usage
///
/// The typestate pattern makes `build()` available only after capacity is set.
///
/// # Examples
///
/// ```
/// use offbox_moka::{EvictionPolicy, MokaStore};
///
/// let store = MokaStore::builder()
///     .label("offline")
///     .max_bytes(50 * 1024 * 1024)
///     .eviction_policy(EvictionPolicy::lru())
///     .build();
/// ```
pub struct MokaStoreBuilder<Cap> {
    capacity: Cap,
    label: SmolStr,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaStoreBuilder<NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            label: SmolStr::new_static("moka"),
            eviction_policy: None,
        }
    }

    /// Sets the maximum number of entries per generation.
    pub fn max_entries(self, capacity: u64) -> MokaStoreBuilder<EntryCapacity> {
        MokaStoreBuilder {
            capacity: EntryCapacity(capacity),
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }

    /// Sets the approximate memory budget in bytes per generation.
    pub fn max_bytes(self, bytes: u64) -> MokaStoreBuilder<ByteCapacity> {
        MokaStoreBuilder {
            capacity: ByteCapacity(bytes),
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl Default for MokaStoreBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> MokaStoreBuilder<Cap> {
    /// Sets a custom label for this store.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<SmolStr>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the eviction policy used by every generation.
    ///
    /// # Default
    ///
    /// - entry capacity: [`EvictionPolicy::tiny_lfu()`]
    /// - byte capacity: [`EvictionPolicy::lru()`]
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }
}

impl MokaStoreBuilder<EntryCapacity> {
    /// Builds the [`MokaStore`] with entry-count based capacity.
    pub fn build(self) -> MokaStore {
        MokaStore::from_parts(
            CacheFactory {
                capacity: Capacity::Entries(self.capacity.0),
                eviction_policy: self.eviction_policy,
            },
            self.label,
        )
    }
}

impl MokaStoreBuilder<ByteCapacity> {
    /// Builds the [`MokaStore`] with byte-based capacity.
    pub fn build(self) -> MokaStore {
        MokaStore::from_parts(
            CacheFactory {
                capacity: Capacity::Bytes(self.capacity.0),
                eviction_policy: self.eviction_policy,
            },
            self.label,
        )
    }
}
