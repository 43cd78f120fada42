pub mod key_encoder;
pub mod key_installer;
pub mod key_manager;
pub mod remote_session;
pub mod secure_shell;
pub mod session_actor;
pub mod ssh_connection;

pub use key_encoder::{encode_public_key, encode_public_key_rfc4253, encode_rsa_components};
pub use key_installer::{install_keys, parse_registered_keys, InstallReport};
pub use key_manager::{KeyManager, KeyStore, MemoryKeyStore};
pub use remote_session::RemoteSession;
pub use secure_shell::SecureShell;
pub use session_actor::{ActorState, PendingCommand, SessionActor};
pub use ssh_connection::RusshSession;
