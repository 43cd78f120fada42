use super::error::{SshActorError, SshResult};
use crate::services::key_encoder::{self, RSA_KEY_TYPE};
use crate::utils::validate_key_name;
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use ssh_key::private::RsaKeypair;
use std::fmt;

/// Default size for generated keys
pub const DEFAULT_RSA_BITS: usize = 4096;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Rsa,
    Unknown,
}

impl From<&str> for KeyType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rsa" | "ssh-rsa" => KeyType::Rsa,
            _ => KeyType::Unknown,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Rsa => write!(f, "rsa"),
            KeyType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A named private key.
///
/// Only the private PEM is stored. The public blob, the `authorized_keys` line
/// and the fingerprint are recomputed from it on every call.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    name: String,
    key_type: KeyType,
    private_key_pem: String,
}

impl KeyMaterial {
    /// Wrap an RSA private key PEM. The PEM must parse.
    pub fn new(name: impl Into<String>, private_key_pem: impl Into<String>) -> SshResult<Self> {
        let name = name.into();
        validate_key_name(&name)?;
        let private_key_pem = private_key_pem.into();
        key_encoder::parse_rsa_private_key(&private_key_pem)?;
        Ok(Self {
            name,
            key_type: KeyType::Rsa,
            private_key_pem,
        })
    }

    /// Generate a fresh RSA key stored as PKCS#1 PEM
    pub fn generate(name: impl Into<String>, bits: usize) -> SshResult<Self> {
        let name = name.into();
        validate_key_name(&name)?;
        let key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| SshActorError::InvalidKeyMaterial {
            message: format!("Failed to generate RSA key: {}", e),
        })?;
        Self::from_rsa(name, &key)
    }

    /// Re-encode any supported RSA PEM flavour as PKCS#1
    pub fn import(name: impl Into<String>, pem: &str) -> SshResult<Self> {
        let name = name.into();
        validate_key_name(&name)?;
        let key = key_encoder::parse_rsa_private_key(pem)?;
        Self::from_rsa(name, &key)
    }

    fn from_rsa(name: String, key: &RsaPrivateKey) -> SshResult<Self> {
        let pem = key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| SshActorError::InvalidKeyMaterial {
                message: format!("Failed to serialize key: {}", e),
            })?;
        Ok(Self {
            name,
            key_type: KeyType::Rsa,
            private_key_pem: pem.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Base64 `ssh-rsa` blob as written into `authorized_keys`
    pub fn public_blob(&self) -> SshResult<String> {
        key_encoder::encode_public_key(&self.private_key_pem)
    }

    /// `ssh-rsa <blob> <name>`
    pub fn authorized_key_line(&self) -> SshResult<String> {
        Ok(format!("{} {} {}", RSA_KEY_TYPE, self.public_blob()?, self.name))
    }

    pub fn fingerprint(&self) -> SshResult<String> {
        key_encoder::fingerprint(&self.private_key_pem)
    }

    /// Key pair in the form the SSH transport authenticates with
    pub fn to_key_pair(&self) -> SshResult<russh_keys::key::KeyPair> {
        let key = key_encoder::parse_rsa_private_key(&self.private_key_pem)?;
        let keypair = RsaKeypair::try_from(key)?;
        let openssh = ssh_key::PrivateKey::from(keypair).to_openssh(ssh_key::LineEnding::LF)?;
        russh_keys::decode_secret_key(&openssh, None).map_err(|e| SshActorError::InvalidKeyMaterial {
            message: e.to_string(),
        })
    }

    pub fn info(&self) -> SshResult<KeyInfo> {
        Ok(KeyInfo {
            name: self.name.clone(),
            key_type: self.key_type,
            fingerprint: self.fingerprint()?,
            public_key: self.authorized_key_line()?,
        })
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub name: String,
    pub key_type: KeyType,
    pub fingerprint: String,
    pub public_key: String,
}
