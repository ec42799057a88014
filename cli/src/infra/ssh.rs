//! Infrastructure implementation of the `Transport` port over SSH.
//!
//! One `SshTransport` owns one authenticated session. Commands run on fresh
//! exec channels; file copies share one SFTP subsystem channel, opened on
//! first use.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::{ChannelMsg, Sig};
use russh::client::{AuthResult, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{CommandOutput, Transport, TransportError, TransportState};
use crate::domain::{Credential, RemoteTarget};

/// Default bound on TCP connect plus authentication.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ClientHandler;

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;

    // TODO: verify against ~/.ssh/known_hosts instead of trusting every key.
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Production `Transport` backed by `russh` and `russh-sftp`.
pub struct SshTransport {
    state: TransportState,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    connect_timeout: Duration,
}

impl SshTransport {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            state: TransportState::Disconnected,
            handle: None,
            sftp: None,
            connect_timeout,
        }
    }

    fn connected(&self) -> Result<&Handle<ClientHandler>, TransportError> {
        match (&self.state, &self.handle) {
            (TransportState::Connected, Some(handle)) => Ok(handle),
            _ => Err(TransportError::NotConnected { state: self.state }),
        }
    }

    /// The session's SFTP channel, opened on first use and reused after.
    async fn sftp(&mut self, path: &str) -> Result<&SftpSession, TransportError> {
        self.connected()?;
        if self.sftp.is_none() {
            let session = self.open_sftp(path).await?;
            tracing::debug!("sftp subsystem opened");
            self.sftp = Some(session);
        }
        self.sftp
            .as_ref()
            .ok_or(TransportError::NotConnected { state: self.state })
    }

    async fn open_sftp(&self, path: &str) -> Result<SftpSession, TransportError> {
        let sftp_err = |e: &dyn std::fmt::Display| TransportError::Sftp {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let channel = self
            .connected()?
            .channel_open_session()
            .await
            .map_err(|e| sftp_err(&e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| sftp_err(&e))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_err(&e))
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Transport for SshTransport {
    fn state(&self) -> TransportState {
        self.state
    }

    async fn connect(&mut self, target: &RemoteTarget) -> Result<(), TransportError> {
        match self.state {
            TransportState::Connected => return Ok(()),
            TransportState::Closed | TransportState::Connecting => {
                return Err(TransportError::NotConnected { state: self.state });
            }
            TransportState::Disconnected => {}
        }

        let addr = format!("{}:{}", target.host, target.port);
        tracing::debug!(%addr, user = %target.username, "opening ssh session");
        self.state = TransportState::Connecting;

        match tokio::time::timeout(self.connect_timeout, open_session(target, &addr)).await {
            Ok(Ok(handle)) => {
                self.handle = Some(handle);
                self.state = TransportState::Connected;
                tracing::info!(%addr, "ssh session established");
                Ok(())
            }
            Ok(Err(err)) => {
                self.state = TransportState::Disconnected;
                Err(err)
            }
            Err(_) => {
                self.state = TransportState::Disconnected;
                Err(TransportError::Connect {
                    addr,
                    reason: format!("timed out after {}s", self.connect_timeout.as_secs()),
                })
            }
        }
    }

    async fn execute_command(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let handle = self.connected()?;
        let mut chan = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        tracing::debug!(%command, "executing remote command");
        chan.exec(true, command)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        let mut output = CommandOutput::default();
        let mut closed = false;
        while let Some(msg) = chan.wait().await {
            if collect_message(&msg, &mut output) {
                closed = true;
                break;
            }
        }
        let _ = chan.close().await;
        finish_command(output, closed)
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), TransportError> {
        let sftp = self.sftp(remote).await?;
        let mut lfile = tokio::fs::File::open(local)
            .await
            .map_err(|e| io_error(local, &e))?;
        let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        let sftp_err = |e: &dyn std::fmt::Display| TransportError::Sftp {
            path: remote.to_string(),
            reason: e.to_string(),
        };
        let mut rfile = sftp
            .open_with_flags(remote, flags)
            .await
            .map_err(|e| sftp_err(&e))?;
        tokio::io::copy(&mut lfile, &mut rfile)
            .await
            .map_err(|e| sftp_err(&e))?;
        rfile.flush().await.map_err(|e| sftp_err(&e))?;
        tracing::debug!(local = %local.display(), %remote, "uploaded");
        Ok(())
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<(), TransportError> {
        let sftp = self.sftp(remote).await?;
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        let mut rfile = sftp.open(remote).await.map_err(|e| TransportError::Sftp {
            path: remote.to_string(),
            reason: e.to_string(),
        })?;
        let mut lfile = tokio::fs::File::create(local)
            .await
            .map_err(|e| io_error(local, &e))?;
        tokio::io::copy(&mut rfile, &mut lfile)
            .await
            .map_err(|e| io_error(local, &e))?;
        lfile.flush().await.map_err(|e| io_error(local, &e))?;
        tracing::debug!(%remote, local = %local.display(), "downloaded");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state = TransportState::Closed;
        if let Some(sftp) = self.sftp.take() {
            let _ = sftp.close().await;
        }
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(russh::Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| TransportError::Channel(e.to_string()))?;
            tracing::debug!("ssh session closed");
        }
        Ok(())
    }
}

async fn open_session(
    target: &RemoteTarget,
    addr: &str,
) -> Result<Handle<ClientHandler>, TransportError> {
    let connect_err = |e: &dyn std::fmt::Display| TransportError::Connect {
        addr: addr.to_string(),
        reason: e.to_string(),
    };

    let config = Arc::new(russh::client::Config {
        inactivity_timeout: Some(Duration::from_secs(300)),
        ..Default::default()
    });
    let mut handle = russh::client::connect(
        config,
        (target.host.as_str(), target.port),
        ClientHandler,
    )
    .await
    .map_err(|e| connect_err(&e))?;

    let user = target.username.clone();
    let result = match &target.credential {
        Credential::Password(password) => handle
            .authenticate_password(user, password.clone())
            .await
            .map_err(|e| connect_err(&e))?,
        Credential::KeyFile(path) => {
            let path = expand_home(path);
            let key = russh::keys::load_secret_key(&path, None).map_err(|e| {
                TransportError::Connect {
                    addr: addr.to_string(),
                    reason: format!("cannot load key {}: {e}", path.display()),
                }
            })?;
            let hash = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|e| connect_err(&e))?
                .flatten();
            let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
            handle
                .authenticate_publickey(user, key)
                .await
                .map_err(|e| connect_err(&e))?
        }
    };

    match result {
        AuthResult::Success => Ok(handle),
        AuthResult::Failure { .. } => Err(TransportError::Authentication {
            user: target.username.clone(),
            addr: addr.to_string(),
        }),
    }
}

/// Fold one channel message into `output`. Returns `true` once the channel
/// has closed.
fn collect_message(msg: &ChannelMsg, output: &mut CommandOutput) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            output.stdout.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            output.stderr.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            output.exit_status = Some(*exit_status);
            false
        }
        ChannelMsg::ExitSignal { signal_name, .. } => {
            output.exit_signal = Some(match signal_name {
                Sig::Custom(name) => name.clone(),
                other => format!("{other:?}"),
            });
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

/// A stream that ended before `Close` and before any exit report means the
/// session dropped mid-command.
fn finish_command(output: CommandOutput, closed: bool) -> Result<CommandOutput, TransportError> {
    if closed || output.exit_status.is_some() || output.exit_signal.is_some() {
        Ok(output)
    } else {
        Err(TransportError::Channel(
            "session dropped before the command finished".to_string(),
        ))
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> TransportError {
    TransportError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
