//! Metrics declaration and recording.
//!
//! With the `metrics` feature disabled every function here is an empty
//! inline no-op.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track responses served, labelled by traffic class and source.
    pub static ref RESPONSES_SERVED: &'static str = {
        metrics::describe_counter!(
            "offbox_responses_total",
            "Total number of responses served, by traffic class and source."
        );
        "offbox_responses_total"
    };
    /// Histogram of request handling duration.
    pub static ref REQUEST_DURATION: &'static str = {
        metrics::describe_histogram!(
            "offbox_request_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of intercepted request handling in seconds."
        );
        "offbox_request_duration_seconds"
    };

    // Offload manager metrics

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "offbox_offload_tasks_spawned_total",
            "Total number of background tasks spawned."
        );
        "offbox_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks completed.
    pub static ref OFFLOAD_TASKS_COMPLETED: &'static str = {
        metrics::describe_counter!(
            "offbox_offload_tasks_completed_total",
            "Total number of background tasks run to completion."
        );
        "offbox_offload_tasks_completed_total"
    };
    /// Track number of offload tasks deduplicated (skipped).
    pub static ref OFFLOAD_TASKS_DEDUPLICATED: &'static str = {
        metrics::describe_counter!(
            "offbox_offload_tasks_deduplicated_total",
            "Total number of background refreshes skipped because one was already in flight."
        );
        "offbox_offload_tasks_deduplicated_total"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "offbox_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of background tasks in seconds."
        );
        "offbox_offload_task_duration_seconds"
    };
    /// Track background store writes that failed.
    pub static ref STORE_WRITE_ERRORS: &'static str = {
        metrics::describe_counter!(
            "offbox_store_write_errors_total",
            "Total number of store writes that failed and were dropped."
        );
        "offbox_store_write_errors_total"
    };

    // Deferred write metrics

    /// Track deferred writes enqueued.
    pub static ref DEFERRED_ENQUEUED: &'static str = {
        metrics::describe_counter!(
            "offbox_deferred_writes_enqueued_total",
            "Total number of writes deferred because the network was unreachable."
        );
        "offbox_deferred_writes_enqueued_total"
    };
    /// Track deferred write replay attempts, labelled by outcome.
    pub static ref DEFERRED_REPLAYED: &'static str = {
        metrics::describe_counter!(
            "offbox_deferred_writes_replayed_total",
            "Total number of deferred write replay attempts, by outcome."
        );
        "offbox_deferred_writes_replayed_total"
    };

    // Lifecycle metrics

    /// Track generations deleted by activation, cleanup or clear.
    pub static ref GENERATIONS_DELETED: &'static str = {
        metrics::describe_counter!(
            "offbox_generations_deleted_total",
            "Total number of generations deleted."
        );
        "offbox_generations_deleted_total"
    };
}

/// Record a served response.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_served(class: &'static str, source: &'static str, duration: Duration) {
    metrics::counter!(*RESPONSES_SERVED, "class" => class, "source" => source).increment(1);
    metrics::histogram!(*REQUEST_DURATION, "class" => class).record(duration.as_secs_f64());
}

/// Record a served response (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_served(_class: &'static str, _source: &'static str, _duration: Duration) {}

/// Record a spawned background task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_spawned(key_type: &str) {
    metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "key_type" => key_type.to_string()).increment(1);
}

/// Record a spawned background task (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_spawned(_key_type: &str) {}

/// Record a completed background task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_completed(key_type: &str, duration: Duration) {
    metrics::counter!(*OFFLOAD_TASKS_COMPLETED, "key_type" => key_type.to_string()).increment(1);
    metrics::histogram!(*OFFLOAD_TASK_DURATION, "key_type" => key_type.to_string())
        .record(duration.as_secs_f64());
}

/// Record a completed background task (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_completed(_key_type: &str, _duration: Duration) {}

/// Record a deduplicated background task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_deduplicated(key_type: &str) {
    metrics::counter!(*OFFLOAD_TASKS_DEDUPLICATED, "key_type" => key_type.to_string())
        .increment(1);
}

/// Record a deduplicated background task (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_deduplicated(_key_type: &str) {}

/// Record a dropped store write.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_write_error(generation: &str) {
    metrics::counter!(*STORE_WRITE_ERRORS, "generation" => generation.to_string()).increment(1);
}

/// Record a dropped store write (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_write_error(_generation: &str) {}

/// Record an enqueued deferred write.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_deferred_enqueued() {
    metrics::counter!(*DEFERRED_ENQUEUED).increment(1);
}

/// Record an enqueued deferred write (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_deferred_enqueued() {}

/// Record a replay attempt.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_deferred_replayed(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    metrics::counter!(*DEFERRED_REPLAYED, "outcome" => outcome).increment(1);
}

/// Record a replay attempt (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_deferred_replayed(_delivered: bool) {}

/// Record deleted generations.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_generations_deleted(count: usize) {
    metrics::counter!(*GENERATIONS_DELETED).increment(count as u64);
}

/// Record deleted generations (no-op).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_generations_deleted(_count: usize) {}
