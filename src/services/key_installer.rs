//! Idempotent installation of public keys into a remote `authorized_keys`.
//!
//! Only [`SessionActor::execute`] is used: one `cat` to learn which blobs are
//! already registered, then one `echo >>` per missing key. Running it twice
//! with the same keys appends nothing the second time.

use super::key_encoder::RSA_KEY_TYPE;
use super::remote_session::RemoteSession;
use super::session_actor::SessionActor;
use crate::models::{KeyMaterial, Outcome, SshActorError, SshResult};
use crate::utils::validate_key_name;
use serde::Serialize;
use std::collections::HashSet;

pub const AUTHORIZED_KEYS_PATH: &str = "~/.ssh/authorized_keys";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    /// Keys appended by this run
    pub installed: Vec<String>,
    /// Keys whose blob was already registered
    pub already_present: Vec<String>,
}

pub fn read_command() -> String {
    format!("cat {}", AUTHORIZED_KEYS_PATH)
}

pub fn append_command(blob: &str, name: &str) -> String {
    format!(
        "echo \"{} {} {}\" >> {}",
        RSA_KEY_TYPE, blob, name, AUTHORIZED_KEYS_PATH
    )
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/'
}

/// Leading run of base64 alphabet characters followed by any `=` padding
fn base64_prefix(token: &str) -> &str {
    let body = token.find(|c: char| !is_base64_char(c)).unwrap_or(token.len());
    let padded = token[body..]
        .find(|c: char| c != '=')
        .map_or(token.len(), |end| body + end);
    &token[..padded]
}

/// Blobs of every `ssh-rsa` line (case-insensitive, leading whitespace ignored)
pub fn parse_registered_keys(content: &str) -> HashSet<String> {
    let mut registered = HashSet::new();

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(key_type) = fields.next() else {
            continue;
        };
        if !key_type.eq_ignore_ascii_case(RSA_KEY_TYPE) {
            continue;
        }
        let Some(token) = fields.next() else {
            continue;
        };
        let blob = base64_prefix(token);
        if blob.starts_with(is_base64_char) {
            registered.insert(blob.to_string());
        }
    }

    registered
}

/// Current `authorized_keys` blobs. A missing or unreadable file counts as empty.
async fn registered_keys<S: RemoteSession>(actor: &SessionActor<S>) -> HashSet<String> {
    match actor.execute(read_command(), None).await {
        Outcome::Completed(result) if result.success() => parse_registered_keys(&result.stdout),
        Outcome::Completed(result) => {
            log::warn!(
                "[key_installer] {} not readable (exit {}), treating as empty: {}",
                AUTHORIZED_KEYS_PATH,
                result.exit_code,
                result.stderr.trim()
            );
            HashSet::new()
        }
        Outcome::Failed(e) => {
            log::warn!(
                "[key_installer] Reading {} failed, treating as empty: {}",
                AUTHORIZED_KEYS_PATH,
                e
            );
            HashSet::new()
        }
        Outcome::Canceled => HashSet::new(),
    }
}

/// Append every key in `keys` whose blob is not registered yet.
///
/// Stops at the first append that exits non-zero with `KeyInstallFailed`;
/// keys appended before it stay installed.
pub async fn install_keys<S: RemoteSession>(
    actor: &SessionActor<S>,
    keys: &[KeyMaterial],
) -> SshResult<InstallReport> {
    let mut registered = registered_keys(actor).await;
    log::info!(
        "[key_installer] {} keys already registered on {}",
        registered.len(),
        actor.label()
    );

    let mut report = InstallReport::default();

    for key in keys {
        validate_key_name(key.name())?;
        let blob = key.public_blob()?;

        if registered.contains(&blob) {
            log::info!("[key_installer] {} already present, skipping", key.name());
            report.already_present.push(key.name().to_string());
            continue;
        }

        let result = actor.run(append_command(&blob, key.name())).await?;
        if !result.success() {
            log::warn!(
                "[key_installer] Appending {} failed after installing {:?}",
                key.name(),
                report.installed
            );
            return Err(SshActorError::KeyInstallFailed {
                name: key.name().to_string(),
                stderr: result.stderr,
            });
        }

        log::info!("[key_installer] Installed {} on {}", key.name(), actor.label());
        registered.insert(blob);
        report.installed.push(key.name().to_string());
    }

    Ok(report)
}
