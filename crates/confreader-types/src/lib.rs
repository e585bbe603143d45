//! Shared types describing configuration entries as they are stored and served.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Declared type of a stored configuration value.
///
/// The admin layer records it next to the value so writes can be checked;
/// readers choose their own target type at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigValueType {
    String,
    Int,
    Bool,
    Double,
}

impl ConfigValueType {
    pub const ALL: [ConfigValueType; 4] = [
        ConfigValueType::String,
        ConfigValueType::Int,
        ConfigValueType::Bool,
        ConfigValueType::Double,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigValueType::String => "string",
            ConfigValueType::Int => "int",
            ConfigValueType::Bool => "bool",
            ConfigValueType::Double => "double",
        }
    }
}

impl fmt::Display for ConfigValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValueType(pub String);

impl fmt::Display for UnknownValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown value type `{}` (expected one of: string, int, bool, double)",
            self.0
        )
    }
}

impl std::error::Error for UnknownValueType {}

impl FromStr for ConfigValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigValueType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownValueType(s.to_string()))
    }
}

/// One configuration item owned by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub application_name: String,
    pub key: String,
    pub value: String,
    pub value_type: ConfigValueType,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ConfigEntry {
    /// Build an active entry stamped with the current time.
    pub fn new(
        application_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        value_type: ConfigValueType,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            key: key.into(),
            value: value.into(),
            value_type,
            active: true,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// True when the entry is active and owned by `application_name`.
    pub fn is_visible_to(&self, application_name: &str) -> bool {
        self.active && self.application_name == application_name
    }
}
