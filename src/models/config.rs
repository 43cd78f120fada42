use super::error::{SshActorError, SshResult};
use super::profile::ConnectionProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const CONFIG_FILE_NAME: &str = ".ssh-actor.json";

fn default_connect_timeout() -> u64 {
    10
}

fn default_inactivity_timeout() -> u64 {
    30
}

/// Transport timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            inactivity_timeout_secs: default_inactivity_timeout(),
        }
    }
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

/// Connection profiles plus the settings shared by all of them
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBook {
    #[serde(default)]
    pub settings: ClientSettings,
    /// Directory holding `<name>.pem` private keys
    #[serde(default)]
    pub key_dir: Option<PathBuf>,
    #[serde(default)]
    pub profiles: Vec<ConnectionProfile>,
}

impl ProfileBook {
    /// `~/.ssh-actor.json`
    pub fn default_path() -> SshResult<PathBuf> {
        let home = dirs::home_dir().ok_or(SshActorError::HomeDirNotFound)?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    pub fn parse(content: &str) -> SshResult<Self> {
        let book: ProfileBook = serde_json::from_str(content)?;
        for profile in &book.profiles {
            profile.validate()?;
        }
        Ok(book)
    }

    /// Load a profile book. A missing file yields an empty book.
    pub async fn load(path: &Path) -> SshResult<Self> {
        if !path.exists() {
            log::info!("[config] {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        let book = Self::parse(&content)?;
        log::info!(
            "[config] Loaded {} profiles from {}",
            book.profiles.len(),
            path.display()
        );
        Ok(book)
    }

    pub fn find(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Key directory, defaulting to `~/.ssh-actor/keys`
    pub fn key_dir(&self) -> SshResult<PathBuf> {
        match &self.key_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let home = dirs::home_dir().ok_or(SshActorError::HomeDirNotFound)?;
                Ok(home.join(".ssh-actor").join("keys"))
            }
        }
    }
}
