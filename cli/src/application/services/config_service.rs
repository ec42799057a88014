//! Application service — configuration use-cases.

use std::path::Path;

use crate::application::ports::{ConfigLoader, ProgressReporter};
use crate::domain::{ConfigError, InstanceSpec, validate_config};

/// Load the document at `path` and validate it into the instance list.
///
/// Keys that are accepted but have no effect are reported as warnings.
///
/// # Errors
///
/// Returns the loader's read/parse error or the first validation error.
pub fn load_instances(
    loader: &impl ConfigLoader,
    path: &Path,
    reporter: &impl ProgressReporter,
) -> Result<Vec<InstanceSpec>, ConfigError> {
    let config = loader.load(path)?;
    tracing::debug!(path = %path.display(), instances = config.instances.len(), "config loaded");

    for (index, inst) in config.instances.iter().enumerate() {
        let ignored = inst.ignored_keys();
        if ignored.is_empty() {
            continue;
        }
        let name = inst
            .name
            .clone()
            .unwrap_or_else(|| format!("instance-{}", index + 1));
        tracing::warn!(instance = %name, keys = ?ignored, "ignoring environment provisioning keys");
        reporter.warn(&format!(
            "[{name}] ignoring {}: environment provisioning is not supported",
            ignored.join(", ")
        ));
    }

    validate_config(&config)
}
