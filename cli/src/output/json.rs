//! JSON output helpers.
//!
//! Provides the report and validation documents printed with `--json`, and
//! the error-object formatter used by every `--json` code path when a command
//! fails.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::domain::{BackendSpec, InstanceOutcome, InstanceSpec, InstanceStatus, RunReport, StageRun};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// The whole run report. Captured streams are decoded lossily as UTF-8.
#[must_use]
pub fn report_json(report: &RunReport) -> Value {
    json!({
        "success": report.success(),
        "started_at": report.started_at.to_rfc3339(),
        "instances": report.instances.iter().map(instance_json).collect::<Vec<_>>(),
    })
}

fn instance_json(outcome: &InstanceOutcome) -> Value {
    let (status, stage, error) = match &outcome.status {
        InstanceStatus::Succeeded => ("succeeded", Value::Null, Value::Null),
        InstanceStatus::Failed { stage, cause } => (
            "failed",
            json!(stage.as_str()),
            json!({ "kind": cause.kind(), "message": cause.to_string() }),
        ),
    };
    json!({
        "name": outcome.name,
        "mode": outcome.mode,
        "status": status,
        "failed_stage": stage,
        "error": error,
        "close_error": outcome.close_error,
        "duration_ms": outcome.duration_ms,
        "runs": outcome.runs.iter().map(run_json).collect::<Vec<_>>(),
    })
}

fn run_json(run: &StageRun) -> Value {
    json!({
        "stage": run.stage.as_str(),
        "script": run.script,
        "exit_code": run.outcome.exit_code,
        "completed": run.outcome.completed,
        "stdout": run.outcome.stdout_lossy(),
        "stderr": run.outcome.stderr_lossy(),
    })
}

/// Summary of a validated configuration. Credentials are never included.
#[must_use]
pub fn validation_json(path: &Path, instances: &[InstanceSpec]) -> Value {
    let instances = instances
        .iter()
        .map(|spec| {
            let (host, workdir) = match &spec.backend {
                BackendSpec::Local { workdir } => (Value::Null, workdir.display().to_string()),
                BackendSpec::Remote { target, workdir } => {
                    (json!(format!("{}:{}", target.host, target.port)), workdir.clone())
                }
            };
            json!({
                "name": spec.name,
                "mode": spec.backend.mode(),
                "host": host,
                "workdir": workdir,
                "interpreter": spec.interpreter,
                "etl_script": spec.etl_script.as_ref().map(|p| p.display().to_string()),
                "training_script": spec.training_script.as_ref().map(|p| p.display().to_string()),
                "dataset_path": spec.dataset_path.as_ref().map(|p| p.display().to_string()),
                "tracking_uri": spec.tracking_uri,
                "artifacts": spec.artifacts.len(),
            })
        })
        .collect::<Vec<_>>();
    json!({
        "valid": true,
        "path": path.display().to_string(),
        "instances": instances,
    })
}
