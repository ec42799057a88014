//! Validate command — load and check the configuration without running it.

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::config_service::load_instances;
use crate::commands::ConfigArgs;
use crate::infra::config::{YamlConfigLoader, resolve_config_path};
use crate::output::json::validation_json;
use crate::output::{HumanRenderer, SilentReporter, TerminalReporter};

/// Run the validate command.
///
/// # Errors
///
/// Returns the first configuration error found.
pub fn run(app: &AppContext, args: &ConfigArgs) -> Result<()> {
    if app.is_json() {
        execute(app, args, &SilentReporter)
    } else {
        execute(app, args, &TerminalReporter::new(&app.output))
    }
}

fn execute(app: &AppContext, args: &ConfigArgs, reporter: &impl ProgressReporter) -> Result<()> {
    let path = resolve_config_path(args.file.as_deref());
    let instances = load_instances(&YamlConfigLoader, &path, reporter)?;

    if app.is_json() {
        let doc = serde_json::to_string_pretty(&validation_json(&path, &instances))
            .context("JSON serialization failed")?;
        println!("{doc}");
    } else {
        HumanRenderer::new(&app.output).render_validation(&path, &instances);
    }
    Ok(())
}
