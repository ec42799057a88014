//! Infrastructure implementation of the `ConfigLoader` port.

use std::path::{Path, PathBuf};

use crate::application::ports::ConfigLoader;
use crate::domain::{ConfigError, FlowkestraConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "FLOWKESTRA_CONFIG";

/// File looked up in the current directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "flowkestra.yaml";

/// Production implementation of `ConfigLoader` that reads a YAML file on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlConfigLoader;

impl ConfigLoader for YamlConfigLoader {
    fn load(&self, path: &Path) -> Result<FlowkestraConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Pick the configuration file: explicit flag, then `FLOWKESTRA_CONFIG`,
/// then `./flowkestra.yaml`.
#[must_use]
pub fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(val) if !val.is_empty() => PathBuf::from(val),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}
