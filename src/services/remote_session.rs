use crate::models::{CommandResult, SshResult};
use tokio_util::sync::CancellationToken;

/// A blocking, single-threaded-use connection to one remote host.
///
/// Implementations are moved onto the session actor's worker thread and only
/// ever called from there, one call at a time. They must be `Send` but need
/// not be `Sync`.
pub trait RemoteSession: Send + 'static {
    fn connect(&mut self) -> SshResult<()>;

    /// Run `command` to completion.
    ///
    /// `cancel` is advisory. Implementations that can abort early (for example
    /// by closing the channel) should watch it and return
    /// `SshActorError::OperationCanceled`; others may ignore it and run to
    /// completion.
    fn execute(&mut self, command: &str, cancel: &CancellationToken) -> SshResult<CommandResult>;

    fn disconnect(&mut self) -> SshResult<()>;

    /// Short label used for the worker thread name and log lines
    fn label(&self) -> String {
        "session".to_string()
    }
}
