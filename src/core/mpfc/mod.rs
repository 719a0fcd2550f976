// src/core/mpfc/mod.rs

//! The memory-pressure feedback controller: aggregates per-queue duration
//! reports, computes a target duration from memory pressure, and pushes targets
//! back to queues whose allotment just shrank.

pub mod actor;
pub mod handle;
pub mod state;

use async_trait::async_trait;
use std::fmt;

/// Opaque identity of a registered queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueId(pub String);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for QueueId {
    fn from(s: &str) -> Self {
        QueueId(s.to_string())
    }
}

impl From<String> for QueueId {
    fn from(s: String) -> Self {
        QueueId(s)
    }
}

/// A point-in-time view of the controller's state, for metrics exposition.
/// `memory_ratio` is recomputed against the `MemoryOracle` at query time; it is
/// not cached, since it can change between ticks.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub desired_duration: f64,
    pub tracked_queue_count: usize,
    pub memory_ratio: f64,
}

/// The Rust analogue of the original `(module, function, prefix_args)` deferred
/// invocation shape: applying the callback with one more argument — the new
/// target duration — performs the push to the queue.
#[async_trait]
pub trait QueueCallback: Send + Sync {
    async fn push_target(&self, target: f64);
}

/// Tunables for the control loop. Defaults match the values named in the
/// controller's design; every field is independently overridable via
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct MpfcConfig {
    /// Fraction of the raw VM memory limit used as the controller's working
    /// budget.
    pub mem_scale: f64,
    /// Below this memory ratio, the target collapses to infinity (no pressure).
    pub limit_threshold: f64,
    /// Below this memory ratio, `sum` is inflated by `sum_inc_amount` before
    /// computing the target.
    pub sum_inc_threshold: f64,
    pub sum_inc_amount: f64,
    /// Minimum reported duration below which a previously-infinite queue keeps
    /// hearing infinity (oscillation guard).
    pub osc_guard: f64,
    /// `sum` is clamped to exactly zero when its magnitude falls below this.
    pub epsilon: f64,
    /// Interval between periodic recomputations.
    pub tick: std::time::Duration,
    /// Fallback memory limit in bytes when no `MemoryOracle` limit is available.
    pub vmm_default_bytes: u64,
}

impl Default for MpfcConfig {
    fn default() -> Self {
        Self {
            mem_scale: 0.6,
            limit_threshold: 0.5,
            sum_inc_threshold: 0.95,
            sum_inc_amount: 1.0,
            osc_guard: 1.0,
            epsilon: 1e-6,
            tick: std::time::Duration::from_millis(2500),
            vmm_default_bytes: 1 << 30,
        }
    }
}
