pub mod command;
pub mod config;
pub mod error;
pub mod key_info;
pub mod profile;

pub use command::{CommandResult, Outcome};
pub use config::{ClientSettings, ProfileBook};
pub use error::{SshActorError, SshResult};
pub use key_info::{KeyInfo, KeyMaterial, KeyType, DEFAULT_RSA_BITS};
pub use profile::ConnectionProfile;
