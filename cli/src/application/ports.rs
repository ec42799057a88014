//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Output;

use anyhow::Result;
use thiserror::Error;

use crate::domain::{
    BackendError, ConfigError, FlowkestraConfig, InstanceSpec, RemoteTarget, RunOutcome,
};

// ── Execution backend port ────────────────────────────────────────────────────

/// Direction of an artifact transfer relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local file or directory → backend path (dataset staging).
    ToBackend,
    /// Backend file → local path (artifact retrieval).
    FromBackend,
}

/// The capability set every execution backend exposes.
///
/// Variants differ only in how each operation is carried out, never in what
/// it guarantees. A non-zero exit status from `run_script` is reported in the
/// returned [`RunOutcome`], not as an error.
#[allow(async_fn_in_trait)]
pub trait ExecutionBackend {
    /// Establish readiness: create the working directory, and for remote
    /// backends connect and authenticate first.
    async fn prepare(&mut self) -> Result<(), BackendError>;

    /// Copy or upload `local_path` into the working directory, keeping its
    /// base name. Returns the path in the backend's namespace.
    async fn deploy_script(&mut self, local_path: &Path) -> Result<String, BackendError>;

    /// Run a deployed script to completion and capture both streams.
    async fn run_script(
        &mut self,
        deployed_path: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<RunOutcome, BackendError>;

    /// Move a file between the local machine and the backend.
    ///
    /// For [`TransferDirection::ToBackend`] `source` is local and `dest` is a
    /// backend path; for [`TransferDirection::FromBackend`] it is the reverse.
    async fn transfer_artifact(
        &mut self,
        source: &str,
        dest: &str,
        direction: TransferDirection,
    ) -> Result<(), BackendError>;

    /// Resolve `path` in the backend's namespace: absolute paths pass
    /// through, relative ones are joined onto the working directory.
    fn resolve_path(&self, path: &str) -> String;

    /// Release backend resources. Safe to call more than once.
    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Builds the backend bound to one instance.
pub trait BackendFactory {
    type Backend: ExecutionBackend;

    /// Construct (but do not prepare) the backend for `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed at all.
    fn build(&self, spec: &InstanceSpec) -> Result<Self::Backend, BackendError>;
}

// ── Transport port ────────────────────────────────────────────────────────────

/// Connection state of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` if the channel closed without reporting an exit status.
    pub exit_status: Option<u32>,
    /// Name of the signal that terminated the command, if any.
    pub exit_signal: Option<String>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is {state}, not connected")]
    NotConnected { state: TransportState },

    #[error("cannot connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("authentication failed for {user}@{addr}")]
    Authentication { user: String, addr: String },

    #[error("channel error: {0}")]
    Channel(String),

    #[error("sftp error on {path}: {reason}")]
    Sftp { path: String, reason: String },

    #[error("local i/o error on {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Narrow secure-shell session used by the remote backend.
///
/// `execute_command`, `upload` and `download` are only valid while
/// [`TransportState::Connected`]; in any other state they fail with
/// [`TransportError::NotConnected`] without touching the network.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Current connection state.
    fn state(&self) -> TransportState;

    /// Open and authenticate a session to `target`.
    async fn connect(&mut self, target: &RemoteTarget) -> Result<(), TransportError>;

    /// Run `command` through the remote shell and capture its output.
    async fn execute_command(&mut self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Copy a local file to `remote`.
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), TransportError>;

    /// Copy `remote` to a local file.
    async fn download(&mut self, remote: &str, local: &Path) -> Result<(), TransportError>;

    /// Close the session. Valid from any state; idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// A local process invocation with an explicit environment.
#[derive(Debug, Clone)]
pub struct ProcessRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    /// Complete environment of the child; the parent's is not inherited.
    pub env: &'a BTreeMap<String, String>,
    pub cwd: &'a Path,
}

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion, capturing stdout and stderr in full.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or waited on.
    async fn run(&self, request: &ProcessRequest<'_>) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Loads the raw configuration document.
pub trait ConfigLoader {
    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    fn load(&self, path: &Path) -> Result<FlowkestraConfig, ConfigError>;
}

// ── Tracking Probe Port ───────────────────────────────────────────────────────

/// Abstracts the tracking-server reachability check so application services
/// can be tested without real network access.
#[allow(async_fn_in_trait)]
pub trait TrackingProbe {
    /// Check that the tracking server at `uri` answers.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the server is unreachable or
    /// responds with a non-success status.
    async fn probe(&self, uri: &str) -> Result<()>;
}
