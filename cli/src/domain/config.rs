//! Configuration schema and validation.
//!
//! Pure functions only — no I/O, no async, no filesystem access. The raw
//! YAML document deserializes into [`FlowkestraConfig`]; [`validate_config`]
//! turns it into the immutable [`InstanceSpec`] list the orchestrator runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::error::ConfigError;
use crate::domain::instance::{
    ArtifactSpec, BackendSpec, Credential, DEFAULT_INTERPRETER, DEFAULT_LOCAL_WORKDIR,
    DEFAULT_REMOTE_WORKDIR, DEFAULT_SSH_PORT, InstanceSpec, RemoteTarget, is_valid_env_name,
};

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FlowkestraConfig {
    /// Default tracking URI inherited by instances that do not set one.
    pub mlflow_uri: Option<String>,
    pub instances: Vec<InstanceConfig>,
}

/// One entry under `instances:` as written by the user.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InstanceConfig {
    pub name: Option<String>,
    /// `local` (default) or `remote`.
    pub mode: Option<String>,
    pub workdir: Option<String>,
    pub interpreter: Option<String>,
    pub etl_script: Option<String>,
    pub training_script: Option<String>,
    pub dataset_path: Option<String>,
    pub env_vars: BTreeMap<String, serde_yaml::Value>,
    pub mlflow_uri: Option<String>,
    pub artifacts: Vec<ArtifactConfig>,
    pub remote: Option<RemoteConfig>,
    /// Accepted for compatibility, not acted upon.
    pub venv_name: Option<String>,
    /// Accepted for compatibility, not acted upon.
    pub requirements: Option<String>,
}

/// Artifact retrieval entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    pub source: String,
    pub target: String,
}

/// SSH connection block of a remote instance.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RemoteConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub key_filename: Option<String>,
    pub port: Option<u16>,
    pub remote_workdir: Option<String>,
}

impl InstanceConfig {
    /// Keys present in the document that have no effect.
    #[must_use]
    pub fn ignored_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.venv_name.is_some() {
            keys.push("venv_name");
        }
        if self.requirements.is_some() {
            keys.push("requirements");
        }
        keys
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validate the whole document and build the instance list.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found, in declaration order. An empty
/// `instances` list is [`ConfigError::NoInstances`].
pub fn validate_config(config: &FlowkestraConfig) -> Result<Vec<InstanceSpec>, ConfigError> {
    if config.instances.is_empty() {
        return Err(ConfigError::NoInstances);
    }
    config
        .instances
        .iter()
        .enumerate()
        .map(|(index, inst)| validate_instance(index, inst, config.mlflow_uri.as_deref()))
        .collect()
}

/// Validate one instance entry. `index` is its zero-based position.
///
/// # Errors
///
/// Returns a [`ConfigError`] naming the instance and the offending field.
pub fn validate_instance(
    index: usize,
    inst: &InstanceConfig,
    global_tracking_uri: Option<&str>,
) -> Result<InstanceSpec, ConfigError> {
    let name = inst
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("instance-{}", index + 1));

    let mode = inst.mode.as_deref().unwrap_or("local");
    let backend = match mode {
        "local" => BackendSpec::Local {
            workdir: PathBuf::from(inst.workdir.as_deref().unwrap_or(DEFAULT_LOCAL_WORKDIR)),
        },
        "remote" => validate_remote(&name, inst.remote.as_ref())?,
        other => {
            return Err(ConfigError::InvalidMode {
                instance: name,
                mode: other.to_string(),
            });
        }
    };

    let env_vars = validate_env_vars(&name, &inst.env_vars)?;

    let artifacts = inst
        .artifacts
        .iter()
        .map(|a| ArtifactSpec {
            source: a.source.clone(),
            target: PathBuf::from(&a.target),
        })
        .collect();

    Ok(InstanceSpec {
        backend,
        interpreter: inst
            .interpreter
            .clone()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
        etl_script: inst.etl_script.as_ref().map(PathBuf::from),
        training_script: inst.training_script.as_ref().map(PathBuf::from),
        dataset_path: inst.dataset_path.as_ref().map(PathBuf::from),
        env_vars,
        tracking_uri: inst
            .mlflow_uri
            .clone()
            .or_else(|| global_tracking_uri.map(str::to_owned)),
        artifacts,
        name,
    })
}

fn validate_remote(name: &str, remote: Option<&RemoteConfig>) -> Result<BackendSpec, ConfigError> {
    let missing = |field: &str| ConfigError::MissingField {
        instance: name.to_string(),
        field: field.to_string(),
    };
    let remote = remote.ok_or_else(|| missing("remote"))?;
    let host = remote
        .hostname
        .clone()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| missing("remote.hostname"))?;
    let username = remote
        .username
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| missing("remote.username"))?;
    let credential = Credential::select(
        remote.password.clone(),
        remote.key_filename.as_ref().map(PathBuf::from),
    )
    .ok_or_else(|| ConfigError::MissingCredential {
        instance: name.to_string(),
    })?;

    Ok(BackendSpec::Remote {
        target: RemoteTarget {
            host,
            port: remote.port.unwrap_or(DEFAULT_SSH_PORT),
            username,
            credential,
        },
        workdir: remote
            .remote_workdir
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_WORKDIR.to_string()),
    })
}

fn validate_env_vars(
    name: &str,
    raw: &BTreeMap<String, serde_yaml::Value>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.iter()
        .map(|(key, value)| {
            if !is_valid_env_name(key) {
                return Err(ConfigError::InvalidEnvName {
                    instance: name.to_string(),
                    name: key.clone(),
                });
            }
            let value = scalar_to_string(value).ok_or_else(|| ConfigError::InvalidEnvValue {
                instance: name.to_string(),
                name: key.clone(),
            })?;
            Ok((key.clone(), value))
        })
        .collect()
}

/// Render a YAML scalar the way a shell would see it. `None` for collections.
fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_)
        | serde_yaml::Value::Tagged(_) => None,
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
