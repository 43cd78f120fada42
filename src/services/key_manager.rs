use crate::models::{KeyInfo, KeyMaterial, SshActorError, SshResult, DEFAULT_RSA_BITS};
use crate::utils::validate_key_name;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const KEY_EXTENSION: &str = "pem";

/// Lookup of private keys by name
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, name: &str) -> SshResult<Option<KeyMaterial>>;

    /// All of `names`, in order. A missing name is an error.
    async fn get_many(&self, names: &[String]) -> SshResult<Vec<KeyMaterial>> {
        let mut keys = Vec::with_capacity(names.len());
        for name in names {
            let key = self
                .get(name)
                .await?
                .ok_or_else(|| SshActorError::KeyNotFound { name: name.clone() })?;
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Keys held in memory
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, KeyMaterial>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: KeyMaterial) {
        self.keys.write().await.insert(key.name().to_string(), key);
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, name: &str) -> SshResult<Option<KeyMaterial>> {
        Ok(self.keys.read().await.get(name).cloned())
    }
}

/// Private keys stored as `<name>.pem` files in one directory
pub struct KeyManager {
    key_dir: PathBuf,
}

impl KeyManager {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    fn key_path(&self, name: &str) -> SshResult<PathBuf> {
        validate_key_name(name)?;
        Ok(self.key_dir.join(format!("{}.{}", name, KEY_EXTENSION)))
    }

    /// Names of all stored keys, sorted
    pub async fn list(&self) -> SshResult<Vec<String>> {
        let mut names = Vec::new();

        if !self.key_dir.exists() {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.key_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == KEY_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Summaries of all keys that parse; unreadable files are skipped
    pub async fn list_info(&self) -> SshResult<Vec<KeyInfo>> {
        let mut infos = Vec::new();
        for name in self.list().await? {
            match self.get(&name).await {
                Ok(Some(key)) => infos.push(key.info()?),
                Ok(None) => {}
                Err(e) => log::warn!("[key_manager] Skipping {}: {}", name, e),
            }
        }
        Ok(infos)
    }

    /// Generate a new RSA key, replacing any existing key of the same name
    pub async fn store_new(&self, name: &str) -> SshResult<KeyMaterial> {
        let owned = name.to_string();
        let key = tokio::task::spawn_blocking(move || KeyMaterial::generate(owned, DEFAULT_RSA_BITS))
            .await
            .map_err(|e| SshActorError::InvalidKeyMaterial {
                message: format!("Key generation task failed: {}", e),
            })??;
        self.write(&key).await?;
        log::info!("[key_manager] Generated RSA key: {}", name);
        Ok(key)
    }

    /// Import a PEM file (PKCS#1, PKCS#8 or OpenSSH) under `name`
    pub async fn import(&self, name: &str, pem_path: &Path) -> SshResult<KeyMaterial> {
        let pem = fs::read_to_string(pem_path).await?;
        let key = KeyMaterial::import(name, &pem)?;
        self.write(&key).await?;
        log::info!("[key_manager] Imported {} from {}", name, pem_path.display());
        Ok(key)
    }

    pub async fn delete(&self, name: &str) -> SshResult<()> {
        let path = self.key_path(name)?;
        if !path.exists() {
            return Err(SshActorError::KeyNotFound {
                name: name.to_string(),
            });
        }
        fs::remove_file(&path).await?;
        log::info!("[key_manager] Deleted key: {}", name);
        Ok(())
    }

    async fn write(&self, key: &KeyMaterial) -> SshResult<()> {
        let path = self.key_path(key.name())?;

        if !self.key_dir.exists() {
            fs::create_dir_all(&self.key_dir).await?;
            #[cfg(unix)]
            {
                let perms = std::fs::Permissions::from_mode(0o700);
                fs::set_permissions(&self.key_dir, perms).await?;
            }
        }

        fs::write(&path, key.private_key_pem().as_bytes()).await?;

        #[cfg(unix)]
        {
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyStore for KeyManager {
    async fn get(&self, name: &str) -> SshResult<Option<KeyMaterial>> {
        let path = self.key_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let pem = fs::read_to_string(&path).await?;
        KeyMaterial::new(name, pem).map(Some)
    }
}
