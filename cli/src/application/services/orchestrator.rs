//! Application service — job orchestration use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Every instance gets its own backend from the injected factory and runs the
//! fixed pipeline: prepare → ETL → training → dataset → artifacts → close.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::Instrument as _;

use crate::application::ports::{
    BackendFactory, ExecutionBackend, ProgressReporter, TransferDirection,
};
use crate::domain::instance::file_name;
use crate::domain::{
    BackendError, ConfigError, FailureCause, InstanceOutcome, InstanceSpec, InstanceStatus,
    RunReport, Stage, StageRun,
};

/// Knobs for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Download each instance's declared artifacts after training.
    pub retrieve_artifacts: bool,
    /// Run independent instances concurrently instead of one after another.
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            retrieve_artifacts: true,
            parallel: false,
        }
    }
}

type StageResult = Result<(), (Stage, FailureCause)>;

/// Run every instance's pipeline and aggregate the outcomes.
///
/// Instance failures are independent: one instance failing never stops
/// another. Outcomes are reported in declaration order, also in parallel
/// mode.
///
/// # Errors
///
/// Returns [`ConfigError::NoInstances`] before touching any backend when
/// `instances` is empty.
pub async fn run_instances<F: BackendFactory>(
    factory: &F,
    instances: &[InstanceSpec],
    reporter: &impl ProgressReporter,
    opts: RunOptions,
) -> Result<RunReport, ConfigError> {
    if instances.is_empty() {
        return Err(ConfigError::NoInstances);
    }
    let started_at = Utc::now();
    tracing::info!(
        instances = instances.len(),
        parallel = opts.parallel,
        "dispatching instances"
    );

    let outcomes = if opts.parallel {
        join_all(
            instances
                .iter()
                .map(|spec| run_instance(factory, spec, reporter, opts)),
        )
        .await
    } else {
        let mut outcomes = Vec::with_capacity(instances.len());
        for spec in instances {
            outcomes.push(run_instance(factory, spec, reporter, opts).await);
        }
        outcomes
    };

    Ok(RunReport {
        started_at,
        instances: outcomes,
    })
}

/// Run one instance's pipeline and always close its backend.
pub async fn run_instance<F: BackendFactory>(
    factory: &F,
    spec: &InstanceSpec,
    reporter: &impl ProgressReporter,
    opts: RunOptions,
) -> InstanceOutcome {
    let span = tracing::info_span!("instance", name = %spec.name, mode = spec.backend.mode());
    async {
        let started = Instant::now();
        let mut runs = Vec::new();

        let (status, close_error) = match factory.build(spec) {
            Err(err) => (failed(Stage::Prepare, err.into()), None),
            Ok(mut backend) => {
                let status = match drive(&mut backend, spec, reporter, opts, &mut runs).await {
                    Ok(()) => InstanceStatus::Succeeded,
                    Err((stage, cause)) => failed(stage, cause),
                };
                let close_error = match backend.close().await {
                    Ok(()) => None,
                    Err(err) => {
                        tracing::warn!(error = %err, "closing backend failed");
                        reporter.warn(&format!("[{}] close failed: {err}", spec.name));
                        Some(err.to_string())
                    }
                };
                (status, close_error)
            }
        };

        match &status {
            InstanceStatus::Succeeded => {
                tracing::info!("instance succeeded");
                reporter.success(&format!("[{}] finished", spec.name));
            }
            InstanceStatus::Failed { stage, cause } => {
                tracing::warn!(%stage, %cause, "instance failed");
                reporter.warn(&format!("[{}] failed at {stage}: {cause}", spec.name));
            }
        }

        InstanceOutcome {
            name: spec.name.clone(),
            mode: spec.backend.mode(),
            status,
            runs,
            close_error,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
    .instrument(span)
    .await
}

fn failed(stage: Stage, cause: FailureCause) -> InstanceStatus {
    InstanceStatus::Failed { stage, cause }
}

/// Stages 2–6. The first failing stage ends the pipeline.
async fn drive<B: ExecutionBackend>(
    backend: &mut B,
    spec: &InstanceSpec,
    reporter: &impl ProgressReporter,
    opts: RunOptions,
    runs: &mut Vec<StageRun>,
) -> StageResult {
    let name = &spec.name;

    reporter.step(&format!("[{name}] preparing {} backend...", spec.backend.mode()));
    backend
        .prepare()
        .await
        .map_err(|e| (Stage::Prepare, e.into()))?;

    if let Some(script) = &spec.etl_script {
        run_stage(backend, spec, Stage::Etl, script, reporter, runs).await?;
    }

    if let Some(script) = &spec.training_script {
        run_stage(backend, spec, Stage::Training, script, reporter, runs).await?;
    }

    if let Some(dataset) = &spec.dataset_path {
        reporter.step(&format!("[{name}] staging dataset {}...", dataset.display()));
        stage_dataset(backend, dataset)
            .await
            .map_err(|e| (Stage::Dataset, e.into()))?;
    }

    if opts.retrieve_artifacts {
        for artifact in &spec.artifacts {
            let source = backend.resolve_path(&artifact.source);
            let dest = artifact.target.to_string_lossy();
            reporter.step(&format!("[{name}] retrieving {source} -> {dest}..."));
            backend
                .transfer_artifact(&source, &dest, TransferDirection::FromBackend)
                .await
                .map_err(|e| (Stage::Artifacts, e.into()))?;
        }
    }

    Ok(())
}

/// Deploy and run one script. A non-zero exit status fails the stage.
async fn run_stage<B: ExecutionBackend>(
    backend: &mut B,
    spec: &InstanceSpec,
    stage: Stage,
    script: &Path,
    reporter: &impl ProgressReporter,
    runs: &mut Vec<StageRun>,
) -> StageResult {
    let name = &spec.name;

    reporter.step(&format!("[{name}] deploying {stage} script {}...", script.display()));
    let deployed = backend
        .deploy_script(script)
        .await
        .map_err(|e| (stage, e.into()))?;

    reporter.step(&format!("[{name}] running {stage} script {deployed}..."));
    let outcome = backend
        .run_script(&deployed, &spec.env_vars)
        .await
        .map_err(|e| (stage, e.into()))?;
    tracing::info!(%stage, script = %deployed, exit_code = ?outcome.exit_code, "script finished");

    let succeeded = outcome.succeeded();
    let cause = FailureCause::ExitStatus {
        code: outcome.exit_code,
        completed: outcome.completed,
    };
    runs.push(StageRun {
        stage,
        script: deployed,
        outcome,
    });

    if succeeded { Ok(()) } else { Err((stage, cause)) }
}

/// Copy the dataset into the backend's working directory under its base name.
async fn stage_dataset<B: ExecutionBackend>(
    backend: &mut B,
    dataset: &Path,
) -> Result<(), BackendError> {
    let source = dataset.to_string_lossy();
    let base = file_name(dataset).ok_or_else(|| BackendError::Transfer {
        from: source.to_string(),
        to: String::new(),
        reason: "dataset path has no file name".to_string(),
    })?;
    let dest = backend.resolve_path(&base);
    backend
        .transfer_artifact(&source, &dest, TransferDirection::ToBackend)
        .await
}
