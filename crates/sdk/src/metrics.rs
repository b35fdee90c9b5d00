//! SDK-side metrics for observability and operational monitoring.
//!
//! This module provides a pluggable metrics trait (`SdkMetrics`) that SDK users
//! can implement to collect telemetry from the client. Two implementations are
//! included:
//!
//! - [`NoopSdkMetrics`]: Zero-overhead default that discards all metrics.
//! - [`MetricsSdkMetrics`]: Integration with the [`metrics`](https://docs.rs/metrics) crate facade,
//!   forwarding to whatever recorder is installed (Prometheus, StatsD, etc.).
//!
//! # Metric Names
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tally_sdk_requests_total` | Counter | `operation`, `status` | Requests by operation and outcome |
//! | `tally_sdk_request_duration_seconds` | Histogram | `operation` | Submit-to-reply latency |
//! | `tally_sdk_admission_wait_seconds` | Histogram | `operation` | Time spent waiting for a concurrency slot |

use std::{fmt, sync::Arc, time::Duration};

use tally_types::Operation;

/// Trait for SDK-side metrics collection.
///
/// All methods have default no-op implementations, so you only need to
/// override the metrics you care about.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: requests complete on the transport's
/// thread, not the caller's.
pub trait SdkMetrics: Send + Sync + fmt::Debug {
    /// Records the outcome of a completed request.
    ///
    /// - `operation`: The batched operation.
    /// - `duration`: Time from handing the batch to the transport until the reply.
    /// - `success`: Whether a reply arrived with request status `Ok`.
    fn record_request(&self, operation: Operation, duration: Duration, success: bool) {
        let _ = (operation, duration, success);
    }

    /// Records how long a submitter waited for a concurrency slot.
    fn record_admission_wait(&self, operation: Operation, duration: Duration) {
        let _ = (operation, duration);
    }
}

/// No-op metrics implementation with zero overhead.
///
/// This is the default when no metrics backend is configured.
#[derive(Debug, Clone, Copy)]
pub struct NoopSdkMetrics;

impl SdkMetrics for NoopSdkMetrics {}

/// Metrics implementation using the [`metrics`](https://docs.rs/metrics) crate facade.
///
/// All metric names use the `tally_sdk_` prefix.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSdkMetrics;

/// Metric name constants for the `metrics` crate facade.
mod metric_names {
    /// Requests by operation and outcome.
    pub const REQUESTS_TOTAL: &str = "tally_sdk_requests_total";
    /// Request duration distribution.
    pub const REQUEST_DURATION: &str = "tally_sdk_request_duration_seconds";
    /// Admission wait distribution.
    pub const ADMISSION_WAIT: &str = "tally_sdk_admission_wait_seconds";
}

impl SdkMetrics for MetricsSdkMetrics {
    fn record_request(&self, operation: Operation, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        metrics::counter!(
            metric_names::REQUESTS_TOTAL,
            "operation" => operation.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!(metric_names::REQUEST_DURATION, "operation" => operation.as_str())
            .record(duration.as_secs_f64());
    }

    fn record_admission_wait(&self, operation: Operation, duration: Duration) {
        metrics::histogram!(metric_names::ADMISSION_WAIT, "operation" => operation.as_str())
            .record(duration.as_secs_f64());
    }
}

/// Creates the default metrics instance (no-op).
pub(crate) fn default_metrics() -> Arc<dyn SdkMetrics> {
    Arc::new(NoopSdkMetrics)
}
