use super::error::SshResult;
use crate::utils::{validate_hostname, validate_key_name, validate_profile_name};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_port() -> u16 {
    22
}

/// Where and as whom to connect. Supplied by the surrounding application.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Names of private keys (resolved through a key store) offered for auth
    #[serde(default)]
    pub key_names: Vec<String>,
    /// Pinned `SHA256:` host key fingerprint; unset accepts any host key
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,
}

impl ConnectionProfile {
    pub fn new(name: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: None,
            key_names: Vec::new(),
            host_key_fingerprint: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_keys<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn validate(&self) -> SshResult<()> {
        validate_profile_name(&self.name)?;
        validate_hostname(&self.host)?;
        for key_name in &self.key_names {
            validate_key_name(key_name)?;
        }
        Ok(())
    }

    /// `user@host:port`, for logs
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_names", &self.key_names)
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let profile: ConnectionProfile = serde_json::from_str(
            r#"{"name": "web01", "host": "10.0.0.5", "username": "deploy"}"#,
        )
        .unwrap();
        assert_eq!(profile.port, 22);
        assert!(profile.password.is_none());
        assert!(profile.key_names.is_empty());
    }

    #[test]
    fn test_validate() {
        let profile = ConnectionProfile::new("web01", "example.com", "deploy").with_keys(["ci_key"]);
        assert!(profile.validate().is_ok());

        let bad_name = ConnectionProfile::new("1web", "example.com", "deploy");
        assert!(bad_name.validate().is_err());

        let bad_host = ConnectionProfile::new("web01", "example.com; reboot", "deploy");
        assert!(bad_host.validate().is_err());

        let bad_key = ConnectionProfile::new("web01", "example.com", "deploy").with_keys(["k y"]);
        assert!(bad_key.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let profile = ConnectionProfile::new("web01", "example.com", "deploy").with_password("hunter2");
        let debug = format!("{:?}", profile);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
