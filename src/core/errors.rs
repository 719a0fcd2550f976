// src/core/errors.rs

//! Error types for the feature-flag coordinator and the memory-pressure controller.

use thiserror::Error;

/// Errors surfaced by the feature-flag coordinator's public operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FfcError {
    /// At least one node in the cluster (possibly this one) does not support the flag.
    #[error("feature flag is not supported on every node in the cluster")]
    Unsupported,

    /// The flag's migration callback panicked while running.
    #[error("migration crashed: {reason}")]
    MigrationCrash { reason: String, trace: String },

    /// The migration ran to completion but returned an application-defined failure.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// The two-sided node compatibility check failed.
    #[error("incompatible feature flags with peer")]
    IncompatibleFeatureFlags,

    /// A peer RPC failed in a way that could not be interpreted as "unsupported".
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by the memory-pressure feedback controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MpfcError {
    /// A reported or pushed-back duration must be a non-negative finite value or `+inf`.
    #[error("invalid duration: {0}")]
    InvalidDuration(f64),

    /// An operation referenced a queue id that was never registered (or was already
    /// deregistered).
    #[error("unknown queue: {0}")]
    UnknownQueue(String),
}
