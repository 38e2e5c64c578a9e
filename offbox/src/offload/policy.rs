//! Offload task policies and configuration.

use std::time::Duration;

/// What to do when a background task runs long.
///
/// Tasks are never cancelled: they run to completion or failure.
#[derive(Debug, Clone, Default)]
pub enum SlowTaskPolicy {
    /// Say nothing.
    #[default]
    Ignore,
    /// Log a warning once the task finishes if it took longer than the threshold.
    Warn(Duration),
}

/// Configuration for the OffloadManager.
#[derive(Debug, Clone)]
pub struct OffloadConfig {
    /// Policy for slow tasks.
    pub slow_task_policy: SlowTaskPolicy,
    /// Skip a refresh when one for the same identity is already in flight.
    pub deduplicate: bool,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            slow_task_policy: SlowTaskPolicy::Ignore,
            deduplicate: true,
        }
    }
}

impl OffloadConfig {
    /// Create a new builder for OffloadConfig.
    pub fn builder() -> OffloadConfigBuilder {
        OffloadConfigBuilder::new()
    }
}

/// Builder for OffloadConfig.
#[derive(Debug, Clone)]
pub struct OffloadConfigBuilder {
    slow_task_policy: SlowTaskPolicy,
    deduplicate: bool,
}

impl Default for OffloadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OffloadConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            slow_task_policy: SlowTaskPolicy::Ignore,
            deduplicate: true,
        }
    }

    /// Warn about tasks slower than `threshold`.
    pub fn warn_after(self, threshold: Duration) -> Self {
        Self {
            slow_task_policy: SlowTaskPolicy::Warn(threshold),
            ..self
        }
    }

    /// Enable or disable refresh deduplication.
    pub fn deduplicate(self, enabled: bool) -> Self {
        Self {
            deduplicate: enabled,
            ..self
        }
    }

    /// Build the OffloadConfig.
    pub fn build(self) -> OffloadConfig {
        OffloadConfig {
            slow_task_policy: self.slow_task_policy,
            deduplicate: self.deduplicate,
        }
    }
}
