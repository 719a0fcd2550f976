// src/core/metrics.rs

//! Registers and exposes Prometheus metrics for the coordinator and controller.
//! Metrics are registered once, globally, for the process lifetime, the same
//! discipline the rest of this codebase's services use.

use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, TextEncoder, register_counter, register_gauge,
};

lazy_static! {
    /// The memory-pressure controller's most recently computed target duration,
    /// in seconds. `f64::INFINITY` is reported as a very large finite value since
    /// Prometheus gauges cannot represent infinity meaningfully in most scrapers.
    pub static ref MPFC_DESIRED_DURATION_SECONDS: Gauge = register_gauge!(
        "mpfc_desired_duration_seconds",
        "Most recently computed push-back target duration, in seconds."
    )
    .unwrap();

    /// The number of queues currently registered with the controller.
    pub static ref MPFC_TRACKED_QUEUE_COUNT: Gauge = register_gauge!(
        "mpfc_tracked_queue_count",
        "Number of queues currently registered with the memory-pressure controller."
    )
    .unwrap();

    /// The most recently observed memory usage ratio (used / working budget).
    pub static ref MPFC_MEMORY_RATIO: Gauge = register_gauge!(
        "mpfc_memory_ratio",
        "Most recently observed ratio of used memory to the controller's working budget."
    )
    .unwrap();

    /// Total number of successful `enable` calls.
    pub static ref FFC_FLAGS_ENABLED_TOTAL: Counter = register_counter!(
        "ffc_flags_enabled_total",
        "Total number of feature flags successfully enabled on this node."
    )
    .unwrap();

    /// Total number of `enable` calls that returned an error.
    pub static ref FFC_ENABLE_FAILURES_TOTAL: Counter = register_counter!(
        "ffc_enable_failures_total",
        "Total number of feature flag enable attempts that failed."
    )
    .unwrap();
}

/// Gathers all registered metrics, encoded in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}

/// A reasonably large finite stand-in for `f64::INFINITY` when reporting to a
/// Prometheus gauge.
pub const INFINITY_GAUGE_VALUE: f64 = 1.0e12;

pub fn duration_gauge_value(duration: f64) -> f64 {
    if duration.is_infinite() {
        INFINITY_GAUGE_VALUE
    } else {
        duration
    }
}
