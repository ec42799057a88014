//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while loading or validating the instance configuration.
///
/// Every variant is fatal: it is surfaced before any backend is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No instances defined. Add at least one entry under 'instances:'.")]
    NoInstances,

    #[error("Instance '{instance}' is missing required field '{field}'.")]
    MissingField { instance: String, field: String },

    #[error("Invalid mode '{mode}' for instance '{instance}'. Use 'local' or 'remote'.")]
    InvalidMode { instance: String, mode: String },

    #[error("Instance '{instance}' needs either 'password' or 'key_filename' under 'remote:'.")]
    MissingCredential { instance: String },

    #[error("Invalid environment variable name '{name}' in instance '{instance}'.")]
    InvalidEnvName { instance: String, name: String },

    #[error("Environment variable '{name}' in instance '{instance}' must be a scalar value.")]
    InvalidEnvValue { instance: String, name: String },

    #[error("Cannot read configuration file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Cannot parse configuration file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Tracking server at {uri} is unreachable: {reason}")]
    TrackingUnreachable { uri: String, reason: String },
}

// ── Backend errors ────────────────────────────────────────────────────────────

/// Failures of a single backend operation.
///
/// These are scoped to one instance: the orchestrator records them as that
/// instance's outcome and moves on to the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("session is not connected (state: {0})")]
    NotConnected(String),

    #[error("cannot create working directory {path}: {reason}")]
    Directory { path: String, reason: String },

    #[error("cannot deploy {path}: {reason}")]
    Deploy { path: String, reason: String },

    #[error("cannot execute {path}: {reason}")]
    Execution { path: String, reason: String },

    #[error("cannot transfer {from} to {to}: {reason}")]
    Transfer {
        from: String,
        to: String,
        reason: String,
    },
}

impl BackendError {
    /// Short machine-readable kind, used in JSON reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection_error",
            Self::NotConnected(_) => "not_connected_error",
            Self::Directory { .. } => "directory_error",
            Self::Deploy { .. } => "deploy_error",
            Self::Execution { .. } => "execution_error",
            Self::Transfer { .. } => "transfer_error",
        }
    }
}
