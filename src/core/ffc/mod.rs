// src/core/ffc/mod.rs

//! The feature-flag coordinator: cluster-wide agreement on which flags are
//! enabled, dependency-ordered enabling with migration side-effects, and the
//! two-sided compatibility check gating cluster join.

pub mod actor;
pub mod handle;
pub mod rpc_server;

use std::time::Duration;

/// Tunables for the coordinator. `peer_timeout` bounds every remote call made
/// during `enable` and the compatibility check; a caller wanting a truly
/// unbounded wait can pass `Duration::MAX`.
#[derive(Debug, Clone, Copy)]
pub struct FfcConfig {
    pub peer_timeout: Duration,
}

impl Default for FfcConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(5),
        }
    }
}
