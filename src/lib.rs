//! Serialized async access to one SSH session, plus the pieces built on it:
//! RSA public key wire encoding and idempotent `authorized_keys` installation.

pub mod models;
pub mod services;
pub mod utils;

pub use models::{
    ClientSettings, CommandResult, ConnectionProfile, KeyInfo, KeyMaterial, KeyType, Outcome,
    ProfileBook, SshActorError, SshResult,
};
pub use services::{
    encode_public_key, install_keys, ActorState, InstallReport, KeyManager, KeyStore,
    MemoryKeyStore, PendingCommand, RemoteSession, RusshSession, SecureShell, SessionActor,
};

pub use tokio_util::sync::CancellationToken;
