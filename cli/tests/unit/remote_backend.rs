//! Unit tests for `RemoteBackend` over a mock transport.

#![allow(clippy::expect_used)]

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use flowkestra_cli::application::ports::{
    CommandOutput, ExecutionBackend, TransferDirection, Transport, TransportState,
};
use flowkestra_cli::domain::BackendError;
use flowkestra_cli::infra::remote::RemoteBackend;

use crate::mocks::{MockTransport, remote_target};

fn backend(transport: MockTransport, tracking: Option<&str>) -> RemoteBackend<MockTransport> {
    RemoteBackend::new(
        transport,
        remote_target(),
        "/home/ml/training".to_string(),
        "python3".to_string(),
        tracking.map(str::to_string),
    )
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

// ── prepare ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_prepare_connects_then_creates_workdir() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");

    assert_eq!(b.transport().state(), TransportState::Connected);
    assert_eq!(b.transport().commands, vec!["mkdir -p '/home/ml/training'"]);
}

#[tokio::test]
async fn test_prepare_connect_failure_is_connection_error() {
    let transport = MockTransport {
        connect_fails: true,
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);

    let err = b.prepare().await.expect_err("should fail");

    assert!(matches!(err, BackendError::Connection(_)), "got: {err:?}");
    assert!(b.transport().commands.is_empty());
    assert_eq!(b.transport().state(), TransportState::Disconnected);
}

#[tokio::test]
async fn test_prepare_mkdir_failure_is_directory_error() {
    let transport = MockTransport {
        outputs: VecDeque::from([CommandOutput {
            stdout: Vec::new(),
            stderr: b"mkdir: permission denied\n".to_vec(),
            exit_status: Some(1),
            ..CommandOutput::default()
        }]),
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);

    let err = b.prepare().await.expect_err("should fail");

    assert_eq!(
        err,
        BackendError::Directory {
            path: "/home/ml/training".to_string(),
            reason: "mkdir: permission denied".to_string(),
        }
    );
}

// ── Not connected ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_operations_before_prepare_are_not_connected() {
    let mut b = backend(MockTransport::default(), None);

    let deploy = b
        .deploy_script(Path::new("train.py"))
        .await
        .expect_err("deploy");
    let run = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect_err("run");
    let transfer = b
        .transfer_artifact("model.pkl", "out/model.pkl", TransferDirection::FromBackend)
        .await
        .expect_err("transfer");

    for err in [deploy, run, transfer] {
        assert!(matches!(err, BackendError::NotConnected(_)), "got: {err:?}");
    }
    assert!(b.transport().commands.is_empty());
    assert!(b.transport().uploads.is_empty());
    assert!(b.transport().downloads.is_empty());
}

#[tokio::test]
async fn test_operations_after_close_are_not_connected() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");
    b.close().await.expect("close");

    let err = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect_err("run");
    assert!(matches!(err, BackendError::NotConnected(_)), "got: {err:?}");
}

// ── deploy ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_deploy_uploads_into_workdir_keeping_base_name() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");

    let deployed = b
        .deploy_script(Path::new("scripts/train.py"))
        .await
        .expect("deploy");

    assert_eq!(deployed, "/home/ml/training/train.py");
    assert_eq!(
        b.transport().uploads,
        vec![(PathBuf::from("scripts/train.py"), deployed)]
    );
}

#[tokio::test]
async fn test_deploy_upload_failure_is_deploy_error() {
    let transport = MockTransport {
        upload_fails: true,
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);
    b.prepare().await.expect("prepare");

    let err = b
        .deploy_script(Path::new("train.py"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, BackendError::Deploy { .. }), "got: {err:?}");
}

// ── run ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_sends_only_overlay_environment() {
    let mut b = backend(MockTransport::default(), Some("http://mlflow:5000"));
    b.prepare().await.expect("prepare");

    let outcome = b
        .run_script("/home/ml/training/train.py", &env(&[("EPOCHS", "3")]))
        .await
        .expect("run");

    assert!(outcome.succeeded());
    assert_eq!(
        b.transport().commands[1],
        "cd '/home/ml/training' && env EPOCHS='3' MLFLOW_TRACKING_URI='http://mlflow:5000' \
         'python3' 'train.py'"
    );
}

#[tokio::test]
async fn test_run_override_beats_tracking_uri() {
    let mut b = backend(MockTransport::default(), Some("http://mlflow:5000"));
    b.prepare().await.expect("prepare");

    b.run_script(
        "/home/ml/training/train.py",
        &env(&[("MLFLOW_TRACKING_URI", "file:///tmp/mlruns")]),
    )
    .await
    .expect("run");

    let cmd = &b.transport().commands[1];
    assert!(cmd.contains("MLFLOW_TRACKING_URI='file:///tmp/mlruns'"), "got: {cmd}");
    assert!(!cmd.contains("mlflow:5000"), "got: {cmd}");
}

#[test]
fn test_script_command_without_environment_omits_env() {
    let b = backend(MockTransport::default(), None);
    assert_eq!(
        b.script_command("/home/ml/training/train.py", &BTreeMap::new()),
        "cd '/home/ml/training' && 'python3' 'train.py'"
    );
}

#[test]
fn test_script_command_quotes_values_with_spaces_and_quotes() {
    let b = backend(MockTransport::default(), None);
    let cmd = b.script_command("/w/t.py", &env(&[("MSG", "it's a test")]));
    assert!(cmd.contains(r"MSG='it'\''s a test'"), "got: {cmd}");
}

#[tokio::test]
async fn test_run_nonzero_exit_is_an_outcome_not_an_error() {
    let transport = MockTransport {
        outputs: VecDeque::from([
            CommandOutput {
                exit_status: Some(0),
                ..CommandOutput::default()
            },
            CommandOutput {
                stdout: b"epoch 1\n".to_vec(),
                stderr: b"Traceback\n".to_vec(),
                exit_status: Some(1),
                ..CommandOutput::default()
            },
        ]),
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);
    b.prepare().await.expect("prepare");

    let outcome = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect("run");

    assert_eq!(outcome.exit_code, Some(1));
    assert!(outcome.completed);
    assert_eq!(outcome.stdout_lossy(), "epoch 1\n");
    assert_eq!(outcome.stderr_lossy(), "Traceback\n");
}

#[tokio::test]
async fn test_run_closed_without_exit_status_is_incomplete() {
    let transport = MockTransport {
        outputs: VecDeque::from([
            CommandOutput {
                exit_status: Some(0),
                ..CommandOutput::default()
            },
            CommandOutput::default(),
        ]),
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);
    b.prepare().await.expect("prepare");

    let outcome = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect("run");

    assert!(!outcome.completed);
    assert!(!outcome.succeeded());
}

#[tokio::test]
async fn test_run_killed_by_signal_completes_without_code() {
    let transport = MockTransport {
        outputs: VecDeque::from([
            CommandOutput {
                exit_status: Some(0),
                ..CommandOutput::default()
            },
            CommandOutput {
                stdout: b"epoch 1\n".to_vec(),
                exit_signal: Some("KILL".to_string()),
                ..CommandOutput::default()
            },
        ]),
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);
    b.prepare().await.expect("prepare");

    let outcome = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect("run");

    assert!(outcome.completed);
    assert_eq!(outcome.exit_code, None);
    assert!(!outcome.succeeded());
    assert_eq!(outcome.stdout_lossy(), "epoch 1\n");
}

#[tokio::test]
async fn test_run_dropped_session_is_execution_error() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");
    b.transport_mut().execute_fails = true;

    let err = b
        .run_script("/home/ml/training/train.py", &BTreeMap::new())
        .await
        .expect_err("should fail");
    assert!(matches!(err, BackendError::Execution { .. }), "got: {err:?}");
}

// ── relative working directory ───────────────────────────────────────────────

fn relative_backend(workdir: &str) -> RemoteBackend<MockTransport> {
    RemoteBackend::new(
        MockTransport::default(),
        remote_target(),
        workdir.to_string(),
        "sh".to_string(),
        None,
    )
}

#[tokio::test]
async fn test_relative_workdir_runs_deployed_script_once_resolved() {
    let mut b = relative_backend("training");
    b.prepare().await.expect("prepare");

    let deployed = b
        .deploy_script(Path::new("scripts/train.sh"))
        .await
        .expect("deploy");
    b.run_script(&deployed, &BTreeMap::new()).await.expect("run");

    assert_eq!(deployed, "training/train.sh");
    assert_eq!(
        b.transport().commands,
        vec![
            "mkdir -p 'training'".to_string(),
            "cd 'training' && 'sh' 'train.sh'".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_home_prefixed_workdir_is_login_relative() {
    let mut b = relative_backend("~/training");
    b.prepare().await.expect("prepare");

    let deployed = b.deploy_script(Path::new("train.sh")).await.expect("deploy");
    b.run_script(&deployed, &BTreeMap::new()).await.expect("run");

    assert_eq!(deployed, "training/train.sh");
    assert_eq!(
        b.transport().commands[1],
        "cd 'training' && 'sh' 'train.sh'"
    );
}

#[test]
fn test_script_outside_workdir_keeps_its_path() {
    let b = backend(MockTransport::default(), None);
    assert_eq!(
        b.script_command("/opt/shared/train.py", &BTreeMap::new()),
        "cd '/home/ml/training' && 'python3' '/opt/shared/train.py'"
    );
}

// ── transfer ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transfer_from_backend_downloads() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");

    b.transfer_artifact(
        "/home/ml/training/model.pkl",
        "out/model.pkl",
        TransferDirection::FromBackend,
    )
    .await
    .expect("transfer");

    assert_eq!(
        b.transport().downloads,
        vec![(
            "/home/ml/training/model.pkl".to_string(),
            PathBuf::from("out/model.pkl")
        )]
    );
}

#[tokio::test]
async fn test_transfer_download_failure_is_transfer_error() {
    let transport = MockTransport {
        download_fails: true,
        ..MockTransport::default()
    };
    let mut b = backend(transport, None);
    b.prepare().await.expect("prepare");

    let err = b
        .transfer_artifact("model.pkl", "out/model.pkl", TransferDirection::FromBackend)
        .await
        .expect_err("should fail");
    assert!(matches!(err, BackendError::Transfer { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_transfer_to_backend_uploads_directory_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    std::fs::create_dir_all(data.join("nested")).expect("mkdir");
    std::fs::write(data.join("a.csv"), "a").expect("write");
    std::fs::write(data.join("nested/b.csv"), "b").expect("write");

    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");
    b.transfer_artifact(
        &data.display().to_string(),
        "/home/ml/training/data",
        TransferDirection::ToBackend,
    )
    .await
    .expect("transfer");

    let commands = &b.transport().commands;
    assert!(commands.contains(&"mkdir -p '/home/ml/training/data'".to_string()));
    assert!(commands.contains(&"mkdir -p '/home/ml/training/data/nested'".to_string()));

    let mut remotes: Vec<&str> = b
        .transport()
        .uploads
        .iter()
        .map(|(_, r)| r.as_str())
        .collect();
    remotes.sort_unstable();
    assert_eq!(
        remotes,
        vec![
            "/home/ml/training/data/a.csv",
            "/home/ml/training/data/nested/b.csv"
        ]
    );
}

#[tokio::test]
async fn test_transfer_to_backend_missing_source_is_transfer_error() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");

    let err = b
        .transfer_artifact(
            "/definitely/not/here.csv",
            "/home/ml/training/here.csv",
            TransferDirection::ToBackend,
        )
        .await
        .expect_err("should fail");
    assert!(matches!(err, BackendError::Transfer { .. }), "got: {err:?}");
}

// ── resolve_path / close ─────────────────────────────────────────────────────

#[test]
fn test_resolve_path_uses_posix_join() {
    let b = backend(MockTransport::default(), None);
    assert_eq!(b.resolve_path("model.pkl"), "/home/ml/training/model.pkl");
    assert_eq!(b.resolve_path("/tmp/x"), "/tmp/x");
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut b = backend(MockTransport::default(), None);
    b.prepare().await.expect("prepare");
    b.close().await.expect("first close");
    b.close().await.expect("second close");

    assert_eq!(b.transport().state(), TransportState::Closed);
    assert_eq!(b.transport().close_calls, 2);
}
