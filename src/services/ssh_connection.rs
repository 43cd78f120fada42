use super::remote_session::RemoteSession;
use crate::models::{ClientSettings, CommandResult, ConnectionProfile, KeyMaterial, SshActorError, SshResult};
use async_trait::async_trait;
use russh::{client, ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// SSH client handler
struct ClientHandler {
    hostname: String,
    /// Expected host key fingerprint, without the `SHA256:` prefix
    pinned_fingerprint: Option<String>,
}

impl ClientHandler {
    fn new(hostname: &str, pinned_fingerprint: Option<&str>) -> Self {
        Self {
            hostname: hostname.to_string(),
            pinned_fingerprint: pinned_fingerprint
                .map(|f| f.trim().trim_start_matches("SHA256:").to_string()),
        }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();

        match &self.pinned_fingerprint {
            Some(pinned) if *pinned == fingerprint => {
                log::info!("[ssh_connection] Host key verified for {}", self.hostname);
                Ok(true)
            }
            Some(_) => {
                log::warn!(
                    "[ssh_connection] Host key CHANGED for {}! Got SHA256:{}",
                    self.hostname,
                    fingerprint
                );
                Ok(false)
            }
            None => {
                log::warn!(
                    "[ssh_connection] Accepting unpinned host key for {}: SHA256:{}",
                    self.hostname,
                    fingerprint
                );
                Ok(true)
            }
        }
    }
}

enum ChannelStep {
    Message(Option<ChannelMsg>),
    Canceled,
}

/// Blocking SSH session over russh.
///
/// russh is async, so the session drives it from a private current-thread
/// runtime. That runtime is created on the first `connect`, which the session
/// actor always issues from its own worker thread, never from inside another
/// runtime.
pub struct RusshSession {
    profile: ConnectionProfile,
    keys: Vec<KeyMaterial>,
    settings: ClientSettings,
    runtime: Option<Runtime>,
    handle: Option<client::Handle<ClientHandler>>,
}

impl RusshSession {
    pub fn new(profile: ConnectionProfile, keys: Vec<KeyMaterial>, settings: ClientSettings) -> Self {
        Self {
            profile,
            keys,
            settings,
            runtime: None,
            handle: None,
        }
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    async fn establish(
        profile: &ConnectionProfile,
        settings: &ClientSettings,
        key_pairs: Vec<KeyPair>,
    ) -> SshResult<client::Handle<ClientHandler>> {
        let config = client::Config {
            inactivity_timeout: Some(settings.inactivity_timeout()),
            ..Default::default()
        };

        let addr = format!("{}:{}", profile.host, profile.port);
        log::info!("[ssh_connection] Connecting to {}", profile.address());

        let handler = ClientHandler::new(&profile.host, profile.host_key_fingerprint.as_deref());
        let connect_result = timeout(
            settings.connect_timeout(),
            client::connect(Arc::new(config), addr, handler),
        )
        .await;

        let mut handle = match connect_result {
            Ok(Ok(handle)) => handle,
            Ok(Err(russh::Error::UnknownKey)) => {
                return Err(SshActorError::HostKeyMismatch {
                    hostname: profile.host.clone(),
                })
            }
            Ok(Err(e)) => {
                return Err(SshActorError::ConnectionFailed {
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(SshActorError::ConnectionTimeout),
        };

        let auth_error = |e: russh::Error| SshActorError::ConnectionFailed {
            message: format!("Authentication error: {}", e),
        };

        if let Some(password) = &profile.password {
            if handle
                .authenticate_password(&profile.username, password)
                .await
                .map_err(auth_error)?
            {
                log::info!("[ssh_connection] Password authentication successful");
                return Ok(handle);
            }
            log::debug!("[ssh_connection] Password not accepted, trying keys...");
        }

        for key_pair in key_pairs {
            if handle
                .authenticate_publickey(&profile.username, Arc::new(key_pair))
                .await
                .map_err(auth_error)?
            {
                log::info!("[ssh_connection] Public key authentication successful");
                return Ok(handle);
            }
            log::debug!("[ssh_connection] Key not accepted, trying next...");
        }

        Err(SshActorError::PermissionDenied {
            user: profile.username.clone(),
        })
    }

    async fn run_command(
        handle: &client::Handle<ClientHandler>,
        command: &str,
        cancel: &CancellationToken,
    ) -> SshResult<CommandResult> {
        let command_error = |e: russh::Error| SshActorError::CommandFailed {
            message: e.to_string(),
        };

        let mut channel = handle.channel_open_session().await.map_err(command_error)?;
        channel.exec(true, command).await.map_err(command_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => ChannelStep::Canceled,
                msg = channel.wait() => ChannelStep::Message(msg),
            };

            match step {
                ChannelStep::Canceled => {
                    log::info!("[ssh_connection] Canceling remote command");
                    let _ = channel.close().await;
                    return Err(SshActorError::OperationCanceled);
                }
                ChannelStep::Message(Some(ChannelMsg::Data { data })) => {
                    stdout.extend_from_slice(&data);
                }
                // Extended data type 1 is stderr
                ChannelStep::Message(Some(ChannelMsg::ExtendedData { data, ext: 1 })) => {
                    stderr.extend_from_slice(&data);
                }
                ChannelStep::Message(Some(ChannelMsg::ExitStatus { exit_status })) => {
                    exit_code = Some(exit_status as i32);
                }
                ChannelStep::Message(Some(_)) => {}
                ChannelStep::Message(None) => break,
            }
        }

        Ok(CommandResult::new(
            // No exit status means the server closed without reporting one
            exit_code.unwrap_or(-1),
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
        ))
    }
}

impl RemoteSession for RusshSession {
    fn connect(&mut self) -> SshResult<()> {
        if self.handle.is_some() {
            return Err(SshActorError::AlreadyConnected);
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SshActorError::ConnectionFailed {
                message: format!("Failed to start SSH runtime: {}", e),
            })?;

        let key_pairs = self
            .keys
            .iter()
            .map(KeyMaterial::to_key_pair)
            .collect::<SshResult<Vec<_>>>()?;

        let handle = runtime.block_on(Self::establish(&self.profile, &self.settings, key_pairs))?;
        self.handle = Some(handle);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn execute(&mut self, command: &str, cancel: &CancellationToken) -> SshResult<CommandResult> {
        let (Some(runtime), Some(handle)) = (&self.runtime, &self.handle) else {
            return Err(SshActorError::NotConnected);
        };
        runtime.block_on(Self::run_command(handle, command, cancel))
    }

    fn disconnect(&mut self) -> SshResult<()> {
        let (Some(runtime), Some(handle)) = (self.runtime.take(), self.handle.take()) else {
            return Ok(());
        };
        let result = runtime.block_on(handle.disconnect(Disconnect::ByApplication, "", "English"));
        log::info!("[ssh_connection] Disconnected from {}", self.profile.address());
        result.map_err(|e| SshActorError::ConnectionFailed {
            message: e.to_string(),
        })
    }

    fn label(&self) -> String {
        self.profile.name.clone()
    }
}
