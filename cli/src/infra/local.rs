//! Local execution backend — runs scripts as child processes of this machine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::ports::{CommandRunner, ExecutionBackend, ProcessRequest, TransferDirection};
use crate::domain::instance::file_name;
use crate::domain::{AmbientEnv, BackendError, RunOutcome, build_environment};

/// `ExecutionBackend` over the local filesystem and a [`CommandRunner`].
pub struct LocalBackend<R: CommandRunner> {
    runner: R,
    workdir: PathBuf,
    interpreter: String,
    ambient: AmbientEnv,
    tracking_uri: Option<String>,
}

impl<R: CommandRunner> LocalBackend<R> {
    /// `ambient` is the environment scripts start from; the tracking variable
    /// and per-run overrides are layered on top of it.
    #[must_use]
    pub fn new(
        runner: R,
        workdir: PathBuf,
        interpreter: String,
        ambient: AmbientEnv,
        tracking_uri: Option<String>,
    ) -> Self {
        Self {
            runner,
            workdir,
            interpreter,
            ambient,
            tracking_uri,
        }
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl<R: CommandRunner> ExecutionBackend for LocalBackend<R> {
    async fn prepare(&mut self) -> Result<(), BackendError> {
        tokio::fs::create_dir_all(&self.workdir)
            .await
            .map_err(|e| BackendError::Directory {
                path: self.workdir.display().to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(workdir = %self.workdir.display(), "local workdir ready");
        Ok(())
    }

    async fn deploy_script(&mut self, local_path: &Path) -> Result<String, BackendError> {
        let deploy_err = |reason: String| BackendError::Deploy {
            path: local_path.display().to_string(),
            reason,
        };
        let meta = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| deploy_err(e.to_string()))?;
        if !meta.is_file() {
            return Err(deploy_err("not a regular file".to_string()));
        }
        let name = file_name(local_path).ok_or_else(|| deploy_err("no file name".to_string()))?;
        let dest = self.workdir.join(name);

        if !same_file(local_path, &dest).await {
            tokio::fs::copy(local_path, &dest)
                .await
                .map_err(|e| deploy_err(e.to_string()))?;
        }
        tracing::debug!(from = %local_path.display(), to = %dest.display(), "script deployed");
        Ok(dest.display().to_string())
    }

    async fn run_script(
        &mut self,
        deployed_path: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<RunOutcome, BackendError> {
        let exec_err = |reason: String| BackendError::Execution {
            path: deployed_path.to_string(),
            reason,
        };
        let mut parts = self.interpreter.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| exec_err("empty interpreter".to_string()))?;
        let script = std::path::absolute(deployed_path).map_err(|e| exec_err(e.to_string()))?;
        let mut args: Vec<String> = parts.map(str::to_string).collect();
        args.push(script.display().to_string());

        let env = build_environment(&self.ambient, self.tracking_uri.as_deref(), overrides);
        let request = ProcessRequest {
            program,
            args: &args,
            env: &env,
            cwd: &self.workdir,
        };
        let output = self
            .runner
            .run(&request)
            .await
            .map_err(|e| exec_err(format!("{e:#}")))?;
        Ok(RunOutcome::finished(
            output.status.code(),
            output.stdout,
            output.stderr,
        ))
    }

    async fn transfer_artifact(
        &mut self,
        source: &str,
        dest: &str,
        _direction: TransferDirection,
    ) -> Result<(), BackendError> {
        // Both directions are plain local copies.
        copy_path(Path::new(source), Path::new(dest))
            .await
            .map_err(|e| BackendError::Transfer {
                from: source.to_string(),
                to: dest.to_string(),
                reason: e.to_string(),
            })
    }

    fn resolve_path(&self, path: &str) -> String {
        if Path::new(path).is_absolute() {
            path.to_string()
        } else {
            self.workdir.join(path).display().to_string()
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy a file, or a directory tree, from `source` to `dest`.
async fn copy_path(source: &Path, dest: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::metadata(source).await?;
    if !meta.is_dir() {
        if same_file(source, dest).await {
            return Ok(());
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, dest).await?;
        return Ok(());
    }

    let mut stack: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), dest.to_path_buf())];
    while let Some((src_dir, dst_dir)) = stack.pop() {
        tokio::fs::create_dir_all(&dst_dir).await?;
        let mut entries = tokio::fs::read_dir(&src_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let src_child = entry.path();
            let dst_child = dst_dir.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                stack.push((src_child, dst_child));
            } else {
                tokio::fs::copy(&src_child, &dst_child).await?;
            }
        }
    }
    Ok(())
}
