//! Configuration entries as mirrored from persistent storage.

pub use confreader_types::{ConfigEntry, ConfigValueType, UnknownValueType};

use super::error::DomainError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_VALUE_LEN: usize = 5000;

/// Check an application name or entry key: non-empty, at most
/// [`MAX_NAME_LEN`] characters of `[A-Za-z0-9_-]`.
pub fn validate_name(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(
            field,
            format!("must not exceed {MAX_NAME_LEN} characters"),
        ));
    }
    if !value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(DomainError::validation(
            field,
            "may only contain letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

pub fn validate_value_len(value: &str) -> Result<(), DomainError> {
    if value.chars().count() > MAX_VALUE_LEN {
        return Err(DomainError::validation(
            "value",
            format!("must not exceed {MAX_VALUE_LEN} characters"),
        ));
    }
    Ok(())
}
