//! Production `BackendFactory` — picks the backend variant from the instance's
//! mode.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::application::ports::{BackendFactory, ExecutionBackend, TransferDirection};
use crate::domain::{AmbientEnv, BackendError, BackendSpec, InstanceSpec, RunOutcome};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::local::LocalBackend;
use crate::infra::remote::RemoteBackend;
use crate::infra::ssh::{DEFAULT_CONNECT_TIMEOUT, SshTransport};

/// Either production backend.
pub enum AnyBackend {
    Local(LocalBackend<TokioCommandRunner>),
    Remote(RemoteBackend<SshTransport>),
}

impl ExecutionBackend for AnyBackend {
    async fn prepare(&mut self) -> Result<(), BackendError> {
        match self {
            Self::Local(b) => b.prepare().await,
            Self::Remote(b) => b.prepare().await,
        }
    }

    async fn deploy_script(&mut self, local_path: &Path) -> Result<String, BackendError> {
        match self {
            Self::Local(b) => b.deploy_script(local_path).await,
            Self::Remote(b) => b.deploy_script(local_path).await,
        }
    }

    async fn run_script(
        &mut self,
        deployed_path: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<RunOutcome, BackendError> {
        match self {
            Self::Local(b) => b.run_script(deployed_path, overrides).await,
            Self::Remote(b) => b.run_script(deployed_path, overrides).await,
        }
    }

    async fn transfer_artifact(
        &mut self,
        source: &str,
        dest: &str,
        direction: TransferDirection,
    ) -> Result<(), BackendError> {
        match self {
            Self::Local(b) => b.transfer_artifact(source, dest, direction).await,
            Self::Remote(b) => b.transfer_artifact(source, dest, direction).await,
        }
    }

    fn resolve_path(&self, path: &str) -> String {
        match self {
            Self::Local(b) => b.resolve_path(path),
            Self::Remote(b) => b.resolve_path(path),
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        match self {
            Self::Local(b) => b.close().await,
            Self::Remote(b) => b.close().await,
        }
    }
}

/// Builds local backends over `tokio::process` and remote ones over SSH.
pub struct DefaultBackendFactory {
    ambient: AmbientEnv,
    connect_timeout: Duration,
}

impl DefaultBackendFactory {
    #[must_use]
    pub fn new(ambient: AmbientEnv, connect_timeout: Duration) -> Self {
        Self {
            ambient,
            connect_timeout,
        }
    }

    /// Factory whose local scripts inherit this process's environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::new(std::env::vars().collect(), DEFAULT_CONNECT_TIMEOUT)
    }
}

impl BackendFactory for DefaultBackendFactory {
    type Backend = AnyBackend;

    fn build(&self, spec: &InstanceSpec) -> Result<AnyBackend, BackendError> {
        Ok(match &spec.backend {
            BackendSpec::Local { workdir } => AnyBackend::Local(LocalBackend::new(
                TokioCommandRunner,
                workdir.clone(),
                spec.interpreter.clone(),
                self.ambient.clone(),
                spec.tracking_uri.clone(),
            )),
            BackendSpec::Remote { target, workdir } => AnyBackend::Remote(RemoteBackend::new(
                SshTransport::new(self.connect_timeout),
                target.clone(),
                workdir.clone(),
                spec.interpreter.clone(),
                spec.tracking_uri.clone(),
            )),
        })
    }
}
