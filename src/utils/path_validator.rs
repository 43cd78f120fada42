use crate::models::{SshActorError, SshResult};

/// Profile and key names: at least two word characters, starting with a letter.
pub fn is_name_valid(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    let rest = chars.as_str();
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a key name. Names are embedded in remote shell commands and used as
/// file stems, so anything outside `[A-Za-z][A-Za-z0-9_]+` is rejected.
pub fn validate_key_name(key_name: &str) -> SshResult<()> {
    if key_name.is_empty() {
        return Err(SshActorError::InvalidKeyName {
            message: "Key name cannot be empty".to_string(),
        });
    }

    if key_name.len() > 255 {
        return Err(SshActorError::InvalidKeyName {
            message: "Key name too long (max 255 characters)".to_string(),
        });
    }

    if !is_name_valid(key_name) {
        return Err(SshActorError::InvalidKeyName {
            message: format!(
                "{:?} must be 2+ alphanumerics and start with a letter",
                key_name
            ),
        });
    }

    Ok(())
}

pub fn validate_profile_name(name: &str) -> SshResult<()> {
    if !is_name_valid(name) {
        return Err(SshActorError::InvalidProfile {
            message: format!("{:?} must be 2+ alphanumerics and start with a letter", name),
        });
    }
    Ok(())
}

/// Validate a hostname or IP literal
pub fn validate_hostname(hostname: &str) -> SshResult<()> {
    if hostname.is_empty() {
        return Err(SshActorError::InvalidProfile {
            message: "Hostname cannot be empty".to_string(),
        });
    }

    if hostname.len() > 255 {
        return Err(SshActorError::InvalidProfile {
            message: "Hostname too long".to_string(),
        });
    }

    // Letters, digits, dot, hyphen, underscore, colon and brackets (IPv6)
    let is_valid = hostname.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || c == '.'
            || c == '-'
            || c == '_'
            || c == ':'
            || c == '['
            || c == ']'
    });

    if !is_valid {
        return Err(SshActorError::InvalidProfile {
            message: format!("Hostname contains invalid characters: {}", hostname),
        });
    }

    Ok(())
}
