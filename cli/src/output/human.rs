//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::domain::{BackendSpec, InstanceOutcome, InstanceSpec, InstanceStatus, RunReport, StageRun};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("flowkestra {version}");
    }

    /// Render every instance outcome followed by a summary line.
    pub fn render_report(&self, report: &RunReport) {
        for outcome in &report.instances {
            self.render_instance(outcome);
            if !self.ctx.quiet {
                println!();
            }
        }

        // The failure summary is reported by the caller as the command error.
        if report.success() {
            let total = report.instances.len();
            self.ctx.success(&format!("All {total} instance(s) succeeded"));
        }
    }

    fn render_instance(&self, outcome: &InstanceOutcome) {
        self.ctx.header(&format!("{} ({})", outcome.name, outcome.mode));
        for run in &outcome.runs {
            self.render_run(run);
        }

        let secs = format_duration(outcome.duration_ms);
        match &outcome.status {
            InstanceStatus::Succeeded => {
                self.ctx.success(&format!("{} succeeded in {secs}", outcome.name));
            }
            InstanceStatus::Failed { stage, cause } => {
                self.ctx
                    .error(&format!("{} failed at {stage}: {cause}", outcome.name));
            }
        }
        if let Some(err) = &outcome.close_error {
            self.ctx.warn(&format!("close failed: {err}"));
        }
    }

    fn render_run(&self, run: &StageRun) {
        if self.ctx.quiet {
            return;
        }
        let stdout = run.outcome.stdout_lossy();
        if !stdout.is_empty() {
            let title = format!("=== {} output ===", run.stage);
            println!("{}", title.style(self.ctx.styles.bold));
            print!("{stdout}");
            if !stdout.ends_with('\n') {
                println!();
            }
        }
        let stderr = run.outcome.stderr_lossy();
        if !stderr.is_empty() {
            let title = format!("=== {} errors ===", run.stage);
            println!("{}", title.style(self.ctx.styles.warning));
            print!("{stderr}");
            if !stderr.ends_with('\n') {
                println!();
            }
        }
    }

    /// Render the validated instance list.
    pub fn render_validation(&self, path: &Path, instances: &[InstanceSpec]) {
        self.ctx.success(&format!(
            "{} is valid: {} instance(s)",
            path.display(),
            instances.len()
        ));
        for spec in instances {
            self.ctx.kv(&format!("{}:", spec.name), &describe_instance(spec));
        }
    }
}

/// One-line description of where and what an instance runs.
#[must_use]
pub fn describe_instance(spec: &InstanceSpec) -> String {
    let mut parts = vec![match &spec.backend {
        BackendSpec::Local { workdir } => format!("local in {}", workdir.display()),
        BackendSpec::Remote { target, workdir } => format!(
            "remote {}@{}:{} in {workdir}",
            target.username, target.host, target.port
        ),
    }];
    if let Some(etl) = &spec.etl_script {
        parts.push(format!("etl {}", etl.display()));
    }
    if let Some(train) = &spec.training_script {
        parts.push(format!("training {}", train.display()));
    }
    if let Some(dataset) = &spec.dataset_path {
        parts.push(format!("dataset {}", dataset.display()));
    }
    if !spec.artifacts.is_empty() {
        parts.push(format!("{} artifact(s)", spec.artifacts.len()));
    }
    parts.join(", ")
}

/// Format milliseconds as `"1.2s"`.
#[must_use]
pub fn format_duration(ms: u64) -> String {
    format!("{}.{}s", ms / 1000, (ms % 1000) / 100)
}
