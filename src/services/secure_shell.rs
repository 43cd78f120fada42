use super::key_installer::{self, InstallReport};
use super::key_manager::KeyStore;
use super::session_actor::SessionActor;
use super::ssh_connection::RusshSession;
use crate::models::{ClientSettings, ConnectionProfile, SshActorError, SshResult};
use std::sync::Arc;

/// A connection profile bound to the key store its key names resolve in
pub struct SecureShell<K: KeyStore> {
    profile: ConnectionProfile,
    key_store: Arc<K>,
    settings: ClientSettings,
}

impl<K: KeyStore> SecureShell<K> {
    pub fn new(profile: ConnectionProfile, key_store: Arc<K>, settings: ClientSettings) -> SshResult<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            key_store,
            settings,
        })
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Resolve the profile's keys and connect through a fresh actor
    pub async fn open(&self) -> SshResult<SessionActor<RusshSession>> {
        let keys = self.key_store.get_many(&self.profile.key_names).await?;
        let session = RusshSession::new(self.profile.clone(), keys, self.settings.clone());
        let actor = SessionActor::new(session);
        actor.connect().await?;
        Ok(actor)
    }

    /// Install the named keys into the remote `authorized_keys`, then disconnect.
    ///
    /// Keys are resolved before connecting, so an unknown name fails without
    /// touching the network.
    pub async fn install_key_pair(&self, names: &[String]) -> SshResult<InstallReport> {
        let keys = self.key_store.get_many(names).await?;
        let actor = self.open().await?;

        let result = key_installer::install_keys(&actor, &keys).await;
        let closed = actor.disconnect().await;

        let report = result?;
        closed?;
        Ok(report)
    }

    /// `uname -a` on the remote host
    pub async fn probe(&self) -> SshResult<String> {
        let actor = self.open().await?;

        let result = actor.run("uname -a").await;
        let closed = actor.disconnect().await;

        let result = result?;
        closed?;
        if !result.success() {
            return Err(SshActorError::CommandFailed {
                message: format!("uname -a exited with {}: {}", result.exit_code, result.stderr.trim()),
            });
        }
        Ok(result.stdout.trim().to_string())
    }
}
