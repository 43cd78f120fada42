use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SshActorError {
    // Actor lifecycle
    #[error("Connection is already established")]
    AlreadyConnected,

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session actor is closed")]
    ActorClosed,

    #[error("Session worker panicked: {message}")]
    WorkerPanicked { message: String },

    #[error("Operation canceled")]
    OperationCanceled,

    // Connection errors
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Permission denied for user: {user}")]
    PermissionDenied { user: String },

    #[error("Host key mismatch: {hostname}")]
    HostKeyMismatch { hostname: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    // Key errors
    #[error("Invalid key material: {message}")]
    InvalidKeyMaterial { message: String },

    #[error("Failed to append key {name}: {stderr}")]
    KeyInstallFailed { name: String, stderr: String },

    #[error("Key not found: {name}")]
    KeyNotFound { name: String },

    #[error("Invalid key name: {message}")]
    InvalidKeyName { message: String },

    // Profiles and configuration
    #[error("Invalid profile: {message}")]
    InvalidProfile { message: String },

    #[error("Config error: {message}")]
    ConfigError { message: String },

    // System errors
    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Home directory not found")]
    HomeDirNotFound,
}

impl From<std::io::Error> for SshActorError {
    fn from(e: std::io::Error) -> Self {
        SshActorError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<ssh_key::Error> for SshActorError {
    fn from(e: ssh_key::Error) -> Self {
        SshActorError::InvalidKeyMaterial {
            message: e.to_string(),
        }
    }
}

impl From<rsa::Error> for SshActorError {
    fn from(e: rsa::Error) -> Self {
        SshActorError::InvalidKeyMaterial {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SshActorError {
    fn from(e: serde_json::Error) -> Self {
        SshActorError::ConfigError {
            message: e.to_string(),
        }
    }
}

pub type SshResult<T> = Result<T, SshActorError>;

// Serialized as {type, message} so collaborators can surface errors as plain values
impl serde::Serialize for SshActorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SshActorError", 2)?;
        state.serialize_field("type", &self.error_type())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl SshActorError {
    pub fn error_type(&self) -> &'static str {
        match self {
            SshActorError::AlreadyConnected => "AlreadyConnected",
            SshActorError::NotConnected => "NotConnected",
            SshActorError::ActorClosed => "ActorClosed",
            SshActorError::WorkerPanicked { .. } => "WorkerPanicked",
            SshActorError::OperationCanceled => "OperationCanceled",
            SshActorError::ConnectionFailed { .. } => "ConnectionFailed",
            SshActorError::ConnectionTimeout => "ConnectionTimeout",
            SshActorError::PermissionDenied { .. } => "PermissionDenied",
            SshActorError::HostKeyMismatch { .. } => "HostKeyMismatch",
            SshActorError::CommandFailed { .. } => "CommandFailed",
            SshActorError::InvalidKeyMaterial { .. } => "InvalidKeyMaterial",
            SshActorError::KeyInstallFailed { .. } => "KeyInstallFailed",
            SshActorError::KeyNotFound { .. } => "KeyNotFound",
            SshActorError::InvalidKeyName { .. } => "InvalidKeyName",
            SshActorError::InvalidProfile { .. } => "InvalidProfile",
            SshActorError::ConfigError { .. } => "ConfigError",
            SshActorError::IoError { .. } => "IoError",
            SshActorError::HomeDirNotFound => "HomeDirNotFound",
        }
    }
}
