//! Remote execution backend — runs scripts on an SSH host through a
//! [`Transport`].
//!
//! The remote working directory uses POSIX paths regardless of the local
//! platform. A relative working directory is relative to the login directory,
//! which is where both exec channels and SFTP start. Only the tracking variable and the configured overrides are sent;
//! the remote login environment supplies everything else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::ports::{ExecutionBackend, TransferDirection, Transport, TransportError};
use crate::domain::instance::file_name;
use crate::domain::{AmbientEnv, BackendError, RemoteTarget, RunOutcome, build_environment};

/// `ExecutionBackend` over any [`Transport`].
pub struct RemoteBackend<T: Transport> {
    transport: T,
    target: RemoteTarget,
    workdir: String,
    interpreter: String,
    tracking_uri: Option<String>,
}

impl<T: Transport> RemoteBackend<T> {
    #[must_use]
    pub fn new(
        transport: T,
        target: RemoteTarget,
        workdir: String,
        interpreter: String,
        tracking_uri: Option<String>,
    ) -> Self {
        Self {
            transport,
            target,
            workdir: normalize_workdir(workdir),
            interpreter,
            tracking_uri,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Build the shell line that runs `script` inside the working directory.
    ///
    /// Scripts under the working directory are passed relative to it, since
    /// the command has already changed into it.
    #[must_use]
    pub fn script_command(&self, script: &str, overrides: &BTreeMap<String, String>) -> String {
        let env = build_environment(&AmbientEnv::empty(), self.tracking_uri.as_deref(), overrides);
        let mut cmd = format!("cd {} && ", sh_escape(&self.workdir));
        if !env.is_empty() {
            cmd.push_str("env ");
            for (key, value) in &env {
                cmd.push_str(&format!("{key}={} ", sh_escape(value)));
            }
        }
        let interpreter = self
            .interpreter
            .split_whitespace()
            .map(sh_escape)
            .collect::<Vec<_>>()
            .join(" ");
        cmd.push_str(&interpreter);
        cmd.push(' ');
        cmd.push_str(&sh_escape(self.relative_to_workdir(script)));
        cmd
    }

    fn relative_to_workdir<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.workdir.trim_end_matches('/'))
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(path)
    }

    async fn mkdir_p(&mut self, dir: &str) -> Result<(), BackendError> {
        let output = self
            .transport
            .execute_command(&format!("mkdir -p {}", sh_escape(dir)))
            .await
            .map_err(|e| {
                map_transport(e, |reason| BackendError::Directory {
                    path: dir.to_string(),
                    reason,
                })
            })?;
        if output.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(BackendError::Directory {
            path: dir.to_string(),
            reason: if stderr.is_empty() {
                format!("mkdir exited with status {:?}", output.exit_status)
            } else {
                stderr
            },
        })
    }

    async fn upload_tree(&mut self, source: &Path, dest: &str) -> Result<(), BackendError> {
        let transfer_err = |reason: String| BackendError::Transfer {
            from: source.display().to_string(),
            to: dest.to_string(),
            reason,
        };
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|e| transfer_err(e.to_string()))?;

        if !meta.is_dir() {
            return self
                .transport
                .upload(source, dest)
                .await
                .map_err(|e| map_transport(e, transfer_err));
        }

        let (dirs, files) = walk_local(source, dest)
            .await
            .map_err(|e| transfer_err(e.to_string()))?;
        for dir in &dirs {
            self.mkdir_p(dir).await.map_err(|e| match e {
                BackendError::Directory { reason, .. } => transfer_err(reason),
                other => other,
            })?;
        }
        for (local, remote) in &files {
            self.transport
                .upload(local, remote)
                .await
                .map_err(|e| map_transport(e, transfer_err))?;
        }
        tracing::debug!(dirs = dirs.len(), files = files.len(), "directory uploaded");
        Ok(())
    }
}

impl<T: Transport> ExecutionBackend for RemoteBackend<T> {
    async fn prepare(&mut self) -> Result<(), BackendError> {
        self.transport
            .connect(&self.target)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let workdir = self.workdir.clone();
        self.mkdir_p(&workdir).await?;
        tracing::debug!(%workdir, "remote workdir ready");
        Ok(())
    }

    async fn deploy_script(&mut self, local_path: &Path) -> Result<String, BackendError> {
        let deploy_err = |reason: String| BackendError::Deploy {
            path: local_path.display().to_string(),
            reason,
        };
        let name = file_name(local_path).ok_or_else(|| deploy_err("no file name".to_string()))?;
        let dest = self.resolve_path(&name);
        self.transport
            .upload(local_path, &dest)
            .await
            .map_err(|e| map_transport(e, deploy_err))?;
        Ok(dest)
    }

    async fn run_script(
        &mut self,
        deployed_path: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<RunOutcome, BackendError> {
        let command = self.script_command(deployed_path, overrides);
        let output = self
            .transport
            .execute_command(&command)
            .await
            .map_err(|e| {
                map_transport(e, |reason| BackendError::Execution {
                    path: deployed_path.to_string(),
                    reason,
                })
            })?;
        if let Some(signal) = &output.exit_signal {
            tracing::debug!(script = %deployed_path, %signal, "remote script killed by signal");
        }
        let completed = output.exit_status.is_some() || output.exit_signal.is_some();
        let exit_code = output.exit_status.and_then(|status| i32::try_from(status).ok());
        Ok(if completed {
            RunOutcome::finished(exit_code, output.stdout, output.stderr)
        } else {
            RunOutcome {
                exit_code: None,
                stdout: output.stdout,
                stderr: output.stderr,
                completed: false,
            }
        })
    }

    async fn transfer_artifact(
        &mut self,
        source: &str,
        dest: &str,
        direction: TransferDirection,
    ) -> Result<(), BackendError> {
        match direction {
            TransferDirection::ToBackend => self.upload_tree(Path::new(source), dest).await,
            TransferDirection::FromBackend => self
                .transport
                .download(source, Path::new(dest))
                .await
                .map_err(|e| {
                    map_transport(e, |reason| BackendError::Transfer {
                        from: source.to_string(),
                        to: dest.to_string(),
                        reason,
                    })
                }),
        }
    }

    fn resolve_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{path}", self.workdir.trim_end_matches('/'))
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.transport
            .close()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))
    }
}

/// `~` and `~/x` name the login directory, which relative paths already
/// resolve against. Quoting would otherwise make `~` a literal directory name.
fn normalize_workdir(workdir: String) -> String {
    match workdir.as_str() {
        "~" | "~/" => ".".to_string(),
        w => w.strip_prefix("~/").map_or(workdir.clone(), str::to_string),
    }
}

/// `NotConnected` keeps its own kind; everything else becomes `other`.
fn map_transport(err: TransportError, other: impl FnOnce(String) -> BackendError) -> BackendError {
    match err {
        TransportError::NotConnected { .. } => BackendError::NotConnected(err.to_string()),
        _ => other(err.to_string()),
    }
}

/// Quote `s` for a POSIX shell.
#[must_use]
pub fn sh_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Remote directories to create and `(local, remote)` files to upload for the
/// tree rooted at `source`. Directories come parent-first.
async fn walk_local(
    source: &Path,
    dest: &str,
) -> std::io::Result<(Vec<String>, Vec<(PathBuf, String)>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut stack = vec![(source.to_path_buf(), dest.trim_end_matches('/').to_string())];

    while let Some((local_dir, remote_dir)) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&local_dir).await?;
        dirs.push(remote_dir.clone());
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let remote_child = format!("{remote_dir}/{name}");
            if entry.file_type().await?.is_dir() {
                stack.push((entry.path(), remote_child));
            } else {
                files.push((entry.path(), remote_child));
            }
        }
    }
    Ok((dirs, files))
}
