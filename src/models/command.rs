use super::error::{SshActorError, SshResult};
use serde::{Deserialize, Serialize};

/// Output of a single remote command.
///
/// A non-zero `exit_code` is data, not an error: callers decide what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of a queued operation, delivered to its submitter only.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Failed(SshActorError),
    Canceled,
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    /// Collapse into a `Result`, reporting cancellation as `OperationCanceled`.
    pub fn into_result(self) -> SshResult<T> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Failed(e) => Err(e),
            Outcome::Canceled => Err(SshActorError::OperationCanceled),
        }
    }
}

impl<T> From<SshResult<T>> for Outcome<T> {
    fn from(result: SshResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Completed(value),
            Err(SshActorError::OperationCanceled) => Outcome::Canceled,
            Err(e) => Outcome::Failed(e),
        }
    }
}
