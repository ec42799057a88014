//! Run results — what one script execution, one instance, and one whole
//! dispatch produced.
//!
//! Pure types only. A non-zero exit status is a value here, never an error.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::error::BackendError;

// ── RunOutcome ───────────────────────────────────────────────────────────────

/// Captured result of one script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code, or `None` if the process was killed by a signal or the
    /// remote side never reported one.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The process ran to termination and an exit status was observed.
    pub completed: bool,
}

impl RunOutcome {
    /// Outcome of a process that terminated and reported `exit_code`.
    #[must_use]
    pub fn finished(exit_code: Option<i32>, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            completed: true,
        }
    }

    /// `true` when the process completed with exit code 0.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.completed && self.exit_code == Some(0)
    }

    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

// ── Stages ───────────────────────────────────────────────────────────────────

/// One step of an instance's fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Prepare,
    Etl,
    Training,
    Dataset,
    Artifacts,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Etl => "etl",
            Self::Training => "training",
            Self::Dataset => "dataset",
            Self::Artifacts => "artifacts",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Instance outcome ─────────────────────────────────────────────────────────

/// Why an instance's pipeline stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// A backend operation failed.
    Backend(BackendError),
    /// A script ran but did not exit with status 0.
    ExitStatus { code: Option<i32>, completed: bool },
}

impl FailureCause {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend(err) => err.kind(),
            Self::ExitStatus { .. } => "exit_status",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::ExitStatus {
                completed: false, ..
            } => f.write_str("script did not report an exit status"),
            Self::ExitStatus { code: Some(code), .. } => {
                write!(f, "script exited with status {code}")
            }
            Self::ExitStatus { code: None, .. } => f.write_str("script was terminated by a signal"),
        }
    }
}

impl From<BackendError> for FailureCause {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

/// Final status of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Succeeded,
    Failed { stage: Stage, cause: FailureCause },
}

/// A script run captured during an instance's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    pub stage: Stage,
    pub script: String,
    pub outcome: RunOutcome,
}

/// Everything recorded about one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    pub name: String,
    pub mode: &'static str,
    pub status: InstanceStatus,
    pub runs: Vec<StageRun>,
    /// Error raised by `close()`; logged, never overrides `status`.
    pub close_error: Option<String>,
    pub duration_ms: u64,
}

impl InstanceOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == InstanceStatus::Succeeded
    }

    /// The stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.status {
            InstanceStatus::Succeeded => None,
            InstanceStatus::Failed { stage, .. } => Some(*stage),
        }
    }
}

// ── RunReport ────────────────────────────────────────────────────────────────

/// Aggregate of every instance outcome, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub instances: Vec<InstanceOutcome>,
}

impl RunReport {
    /// `true` only if every instance completed its whole pipeline.
    #[must_use]
    pub fn success(&self) -> bool {
        self.instances.iter().all(InstanceOutcome::succeeded)
    }

    /// `(name, stage)` of every failed instance, in declaration order.
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, Stage)> {
        self.instances
            .iter()
            .filter_map(|i| i.failed_stage().map(|s| (i.name.as_str(), s)))
            .collect()
    }

    /// One-line summary naming the failed instances and stages.
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        let failures = self.failures();
        if failures.is_empty() {
            return None;
        }
        let list = failures
            .iter()
            .map(|(name, stage)| format!("{name} (at {stage})"))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "{} of {} instance(s) failed: {list}",
            failures.len(),
            self.instances.len()
        ))
    }
}
