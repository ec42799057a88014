//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution. Scripts run to completion; there is no
//! timeout at this layer.

use std::process::{Output, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::ports::{CommandRunner, ProcessRequest};

/// Production `CommandRunner` backed by `tokio::process`.
///
/// The child gets exactly the environment in the request. Stdout and stderr
/// are drained concurrently with `wait()` so a chatty script cannot block on
/// a full pipe.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &ProcessRequest<'_>) -> Result<Output> {
        let program = request.program;
        let mut child = tokio::process::Command::new(program)
            .args(request.args)
            .env_clear()
            .envs(request.env)
            .current_dir(request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            drain(stdout_handle),
            drain(stderr_handle),
        );

        Ok(Output {
            status: status.with_context(|| format!("waiting for {program}"))?,
            stdout: stdout.with_context(|| format!("reading stdout of {program}"))?,
            stderr: stderr.with_context(|| format!("reading stderr of {program}"))?,
        })
    }
}

/// Read a captured stream to its end. An absent stream reads as empty.
async fn drain<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
