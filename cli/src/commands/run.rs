//! Run command — dispatch every configured instance and report the outcome.

use anyhow::{Context, Result};
use clap::Args;
use thiserror::Error;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::config_service::load_instances;
use crate::application::services::orchestrator::{RunOptions, run_instances};
use crate::application::services::tracking_check::ensure_tracking_reachable;
use crate::commands::ConfigArgs;
use crate::infra::config::{YamlConfigLoader, resolve_config_path};
use crate::infra::factory::DefaultBackendFactory;
use crate::infra::tracking::UreqTrackingProbe;
use crate::output::json::report_json;
use crate::output::{HumanRenderer, SilentReporter, TerminalReporter};

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Run instances concurrently instead of one after another
    #[arg(long)]
    pub parallel: bool,

    /// Do not download declared artifacts after training
    #[arg(long)]
    pub skip_artifacts: bool,

    /// Do not check that tracking servers answer before dispatching
    #[arg(long)]
    pub skip_tracking_check: bool,
}

/// At least one instance failed. The report has already been rendered.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RunFailed(pub String);

/// Run the run command.
///
/// # Errors
///
/// Returns a configuration error before any backend work, or [`RunFailed`]
/// after the report when any instance failed.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<()> {
    if app.is_json() {
        execute(app, args, &SilentReporter).await
    } else {
        execute(app, args, &TerminalReporter::new(&app.output)).await
    }
}

async fn execute(
    app: &AppContext,
    args: &RunArgs,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let path = resolve_config_path(args.config.file.as_deref());
    let instances = load_instances(&YamlConfigLoader, &path, reporter)?;

    if args.skip_tracking_check {
        tracing::debug!("tracking check skipped");
    } else {
        ensure_tracking_reachable(&UreqTrackingProbe::default(), &instances, reporter).await?;
    }

    let factory = DefaultBackendFactory::from_process_env();
    let opts = RunOptions {
        retrieve_artifacts: !args.skip_artifacts,
        parallel: args.parallel,
    };
    let report = run_instances(&factory, &instances, reporter, opts).await?;

    if app.is_json() {
        let doc = serde_json::to_string_pretty(&report_json(&report))
            .context("JSON serialization failed")?;
        println!("{doc}");
    } else {
        HumanRenderer::new(&app.output).render_report(&report);
    }

    match report.failure_summary() {
        None => Ok(()),
        Some(summary) => Err(RunFailed(summary).into()),
    }
}
