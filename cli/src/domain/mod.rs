//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod instance;
pub mod outcome;

pub use config::{FlowkestraConfig, InstanceConfig, validate_config};
pub use error::{BackendError, ConfigError};
pub use instance::{
    AmbientEnv, ArtifactSpec, BackendSpec, Credential, InstanceSpec, RemoteTarget,
    TRACKING_ENV_VAR, build_environment,
};
pub use outcome::{
    FailureCause, InstanceOutcome, InstanceStatus, RunOutcome, RunReport, Stage, StageRun,
};
