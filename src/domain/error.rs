use thiserror::Error;

use super::convert::TypeTag;

/// A stored value exists but does not parse as the requested type.
///
/// Always surfaced to callers: it points at corrupt data or a wrong type at
/// the call site, never at a missing entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert value `{value}`{} to {target}", describe_key(.key))]
pub struct ConversionError {
    pub key: Option<String>,
    pub value: String,
    pub target: TypeTag,
}

impl ConversionError {
    pub fn new(value: impl Into<String>, target: TypeTag) -> Self {
        Self {
            key: None,
            value: value.into(),
            target,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

fn describe_key(key: &Option<String>) -> String {
    key.as_ref()
        .map(|key| format!(" of `{key}`"))
        .unwrap_or_default()
}

/// Failures visible to callers of the read API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("configuration `{key}` not found for application `{application_name}`")]
    NotFound {
        application_name: String,
        key: String,
    },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl ReadError {
    pub fn not_found(application_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            application_name: application_name.into(),
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain validation failed for `{field}`: {message}")]
    Validation { field: &'static str, message: String },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
