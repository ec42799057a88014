//! Unit tests for the configuration and tracking-check services.

#![allow(clippy::expect_used)]

use std::path::Path;

use flowkestra_cli::application::services::config_service::load_instances;
use flowkestra_cli::application::services::tracking_check::ensure_tracking_reachable;
use flowkestra_cli::domain::{ConfigError, FlowkestraConfig, InstanceConfig};

use crate::mocks::{RecordingProbe, RecordingReporter, StaticLoader, local_spec};

fn config(instances: Vec<InstanceConfig>) -> FlowkestraConfig {
    FlowkestraConfig {
        mlflow_uri: None,
        instances,
    }
}

#[test]
fn test_load_instances_validates_loaded_document() {
    let loader = StaticLoader(Ok(config(vec![InstanceConfig {
        name: Some("i1".to_string()),
        training_script: Some("train.py".to_string()),
        ..InstanceConfig::default()
    }])));
    let reporter = RecordingReporter::default();

    let specs = load_instances(&loader, Path::new("flowkestra.yaml"), &reporter).expect("load");

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].name, "i1");
    assert!(reporter.warnings().is_empty());
}

#[test]
fn test_load_instances_warns_about_provisioning_keys() {
    let loader = StaticLoader(Ok(config(vec![InstanceConfig {
        name: Some("i1".to_string()),
        venv_name: Some("venv".to_string()),
        requirements: Some("requirements.txt".to_string()),
        ..InstanceConfig::default()
    }])));
    let reporter = RecordingReporter::default();

    load_instances(&loader, Path::new("flowkestra.yaml"), &reporter).expect("load");

    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1, "got: {warnings:?}");
    assert!(warnings[0].contains("venv_name, requirements"), "got: {warnings:?}");
}

#[test]
fn test_load_instances_propagates_loader_error() {
    let err = ConfigError::Read {
        path: "flowkestra.yaml".to_string(),
        reason: "No such file or directory".to_string(),
    };
    let loader = StaticLoader(Err(err.clone()));

    let got = load_instances(&loader, Path::new("flowkestra.yaml"), &RecordingReporter::default())
        .expect_err("should fail");
    assert_eq!(got, err);
}

#[test]
fn test_load_instances_empty_document_is_no_instances() {
    let loader = StaticLoader(Ok(FlowkestraConfig::default()));
    let got = load_instances(&loader, Path::new("flowkestra.yaml"), &RecordingReporter::default())
        .expect_err("should fail");
    assert_eq!(got, ConfigError::NoInstances);
}

// ── tracking check ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tracking_check_probes_each_distinct_uri_once() {
    let mut a = local_spec("a");
    a.tracking_uri = Some("http://mlflow:5000".to_string());
    let mut b = local_spec("b");
    b.tracking_uri = Some("http://mlflow:5000".to_string());
    let mut c = local_spec("c");
    c.tracking_uri = Some("http://other:5000".to_string());
    let d = local_spec("d");
    let probe = RecordingProbe::default();

    ensure_tracking_reachable(&probe, &[a, b, c, d], &RecordingReporter::default())
        .await
        .expect("reachable");

    assert_eq!(
        probe.probed(),
        vec!["http://mlflow:5000".to_string(), "http://other:5000".to_string()]
    );
}

#[tokio::test]
async fn test_tracking_check_failure_is_config_error() {
    let mut a = local_spec("a");
    a.tracking_uri = Some("http://down:5000".to_string());
    let probe = RecordingProbe {
        failing: vec!["http://down:5000".to_string()],
        ..RecordingProbe::default()
    };

    let err = ensure_tracking_reachable(&probe, &[a], &RecordingReporter::default())
        .await
        .expect_err("should fail");

    assert!(
        matches!(&err, ConfigError::TrackingUnreachable { uri, .. } if uri == "http://down:5000"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_tracking_check_without_uris_probes_nothing() {
    let probe = RecordingProbe::default();
    ensure_tracking_reachable(&probe, &[local_spec("a")], &RecordingReporter::default())
        .await
        .expect("nothing to check");
    assert!(probe.probed().is_empty());
}
