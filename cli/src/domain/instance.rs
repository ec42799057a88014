//! Instance model — one configured unit of training work.
//!
//! Pure types and functions only — no I/O, no async, no filesystem access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ── Constants ────────────────────────────────────────────────────────────────

/// Environment variable that points training scripts at the tracking server.
pub const TRACKING_ENV_VAR: &str = "MLFLOW_TRACKING_URI";

/// Working directory used by local instances that do not set `workdir`.
pub const DEFAULT_LOCAL_WORKDIR: &str = "./training";

/// Working directory used by remote instances that do not set `remote_workdir`.
pub const DEFAULT_REMOTE_WORKDIR: &str = "/home/user/training";

/// SSH port used when `remote.port` is omitted.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Program used to execute ETL and training scripts.
pub const DEFAULT_INTERPRETER: &str = "python3";

// ── Credentials ──────────────────────────────────────────────────────────────

/// Authentication material for a remote host.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    KeyFile(PathBuf),
}

impl Credential {
    /// Pick the credential to use from the two optional config fields.
    ///
    /// A password wins over a key file when both are present.
    #[must_use]
    pub fn select(password: Option<String>, key_file: Option<PathBuf>) -> Option<Self> {
        match (password, key_file) {
            (Some(pw), _) => Some(Self::Password(pw)),
            (None, Some(path)) => Some(Self::KeyFile(path)),
            (None, None) => None,
        }
    }
}

// Passwords must never end up in logs or reports.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(****)"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

// ── Backend description ──────────────────────────────────────────────────────

/// Connection parameters for a remote SSH host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
}

/// Which execution backend an instance runs on, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    Local { workdir: PathBuf },
    Remote { target: RemoteTarget, workdir: String },
}

impl BackendSpec {
    /// `"local"` or `"remote"`, as written in the configuration.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote { .. } => "remote",
        }
    }
}

/// A file to bring back from the backend after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Backend-side path; relative paths resolve against the working directory.
    pub source: String,
    /// Local destination path.
    pub target: PathBuf,
}

/// One validated instance. Immutable once built by the config validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub name: String,
    pub backend: BackendSpec,
    pub interpreter: String,
    pub etl_script: Option<PathBuf>,
    pub training_script: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub env_vars: BTreeMap<String, String>,
    pub tracking_uri: Option<String>,
    pub artifacts: Vec<ArtifactSpec>,
}

// ── Environment ──────────────────────────────────────────────────────────────

/// Snapshot of the process environment a backend starts its scripts from.
///
/// Captured once and passed around explicitly so that script environments
/// are a pure function of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnv {
    vars: BTreeMap<String, String>,
}

impl AmbientEnv {
    #[must_use]
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// An empty ambient environment (used where the far side supplies its own).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

impl FromIterator<(String, String)> for AmbientEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Build the final environment for a script run.
///
/// Layers, later wins: `ambient`, then the tracking variable (if any), then
/// the caller's `overrides`.
#[must_use]
pub fn build_environment(
    ambient: &AmbientEnv,
    tracking_uri: Option<&str>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = ambient.vars.clone();
    if let Some(uri) = tracking_uri {
        env.insert(TRACKING_ENV_VAR.to_string(), uri.to_string());
    }
    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Returns `true` if `name` is a portable environment variable name.
#[must_use]
pub fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Base name of `path` as a string, if it has one.
#[must_use]
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
