//! Conversion of canonical value text into typed values.
//!
//! Values are stored as text and parsed only when read. Two entry points share
//! the same parsers:
//!
//! - [`convert`] resolves a runtime [`TypeTag`] through a dispatch table and
//!   returns a dynamic [`ConfigValue`]; tags without a table entry fall back to
//!   structured (JSON) parsing.
//! - [`FromConfigValue`] is the typed path used by the tiered cache's
//!   `get_value::<T>` family.
//!
//! Numbers follow the invariant `.` decimal convention. Grouping separators
//! are rejected rather than guessed.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

use super::entities::{ConfigEntry, ConfigValueType};
use super::error::ConversionError;

/// Descriptor of a conversion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Int32,
    Int64,
    Double,
    Decimal,
    Boolean,
    Timestamp,
    /// Any other type, decoded from JSON. Carries the Rust type name.
    Structured(&'static str),
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Int32 => "i32",
            TypeTag::Int64 => "i64",
            TypeTag::Double => "f64",
            TypeTag::Decimal => "decimal",
            TypeTag::Boolean => "bool",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Structured(name) => name,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ConfigValueType> for TypeTag {
    fn from(kind: ConfigValueType) -> Self {
        match kind {
            ConfigValueType::String => TypeTag::String,
            ConfigValueType::Int => TypeTag::Int32,
            ConfigValueType::Bool => TypeTag::Boolean,
            ConfigValueType::Double => TypeTag::Double,
        }
    }
}

/// A converted value whose type was chosen at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Timestamp(OffsetDateTime),
    Structured(serde_json::Value),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(value) => f.write_str(value),
            ConfigValue::Int32(value) => write!(f, "{value}"),
            ConfigValue::Int64(value) => write!(f, "{value}"),
            ConfigValue::Double(value) => write!(f, "{value}"),
            ConfigValue::Decimal(value) => write!(f, "{value}"),
            ConfigValue::Boolean(value) => write!(f, "{value}"),
            ConfigValue::Timestamp(value) => match value.format(&Rfc3339) {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{value}"),
            },
            ConfigValue::Structured(value) => write!(f, "{value}"),
        }
    }
}

type Parser = fn(&str) -> Option<ConfigValue>;

const DISPATCH: &[(TypeTag, Parser)] = &[
    (TypeTag::String, string_value),
    (TypeTag::Int32, i32_value),
    (TypeTag::Int64, i64_value),
    (TypeTag::Double, f64_value),
    (TypeTag::Decimal, decimal_value),
    (TypeTag::Boolean, bool_value),
    (TypeTag::Timestamp, timestamp_value),
];

fn string_value(raw: &str) -> Option<ConfigValue> {
    Some(ConfigValue::String(raw.to_string()))
}

fn i32_value(raw: &str) -> Option<ConfigValue> {
    parse_i32(raw).map(ConfigValue::Int32)
}

fn i64_value(raw: &str) -> Option<ConfigValue> {
    parse_i64(raw).map(ConfigValue::Int64)
}

fn f64_value(raw: &str) -> Option<ConfigValue> {
    parse_f64(raw).map(ConfigValue::Double)
}

fn decimal_value(raw: &str) -> Option<ConfigValue> {
    parse_decimal(raw).map(ConfigValue::Decimal)
}

fn bool_value(raw: &str) -> Option<ConfigValue> {
    parse_bool(raw).map(ConfigValue::Boolean)
}

fn timestamp_value(raw: &str) -> Option<ConfigValue> {
    parse_timestamp(raw).map(ConfigValue::Timestamp)
}

fn structured_value(raw: &str) -> Option<ConfigValue> {
    serde_json::from_str(raw).ok().map(ConfigValue::Structured)
}

/// Convert `raw` to the type described by `target`.
pub fn convert(raw: &str, target: TypeTag) -> Result<ConfigValue, ConversionError> {
    let parser = DISPATCH
        .iter()
        .find(|(tag, _)| *tag == target)
        .map(|(_, parser)| *parser)
        .unwrap_or(structured_value);

    parser(raw).ok_or_else(|| ConversionError::new(raw, target))
}

/// Check that an entry's value parses as its declared type.
pub fn validate_entry_value(entry: &ConfigEntry) -> Result<(), ConversionError> {
    convert(&entry.value, entry.value_type.into())
        .map(|_| ())
        .map_err(|err| err.with_key(entry.key.clone()))
}

/// Types that can be produced from canonical value text.
pub trait FromConfigValue: Sized {
    fn type_tag() -> TypeTag;

    fn parse_config_value(raw: &str) -> Option<Self>;

    fn from_config_value(raw: &str) -> Result<Self, ConversionError> {
        Self::parse_config_value(raw).ok_or_else(|| ConversionError::new(raw, Self::type_tag()))
    }
}

macro_rules! impl_from_config_value {
    ($ty:ty, $tag:expr, $parse:expr) => {
        impl FromConfigValue for $ty {
            fn type_tag() -> TypeTag {
                $tag
            }

            fn parse_config_value(raw: &str) -> Option<Self> {
                $parse(raw)
            }
        }
    };
}

impl_from_config_value!(String, TypeTag::String, |raw: &str| Some(raw.to_string()));
impl_from_config_value!(i32, TypeTag::Int32, parse_i32);
impl_from_config_value!(i64, TypeTag::Int64, parse_i64);
impl_from_config_value!(f64, TypeTag::Double, parse_f64);
impl_from_config_value!(Decimal, TypeTag::Decimal, parse_decimal);
impl_from_config_value!(bool, TypeTag::Boolean, parse_bool);
impl_from_config_value!(OffsetDateTime, TypeTag::Timestamp, parse_timestamp);
impl_from_config_value!(
    serde_json::Value,
    TypeTag::Structured("serde_json::Value"),
    |raw: &str| serde_json::from_str(raw).ok()
);

/// Blank text reads as `None`; anything else must convert as `T`.
impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn type_tag() -> TypeTag {
        T::type_tag()
    }

    fn parse_config_value(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return Some(None);
        }
        T::parse_config_value(raw).map(Some)
    }
}

/// Structured fallback: decode the stored text as JSON into `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> FromConfigValue for Json<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Structured(std::any::type_name::<T>())
    }

    fn parse_config_value(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok().map(Json)
    }
}

fn numeric_text(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(['_', ',', ' ']) {
        return None;
    }
    Some(trimmed)
}

fn parse_i32(raw: &str) -> Option<i32> {
    numeric_text(raw)?.parse().ok()
}

fn parse_i64(raw: &str) -> Option<i64> {
    numeric_text(raw)?.parse().ok()
}

fn parse_f64(raw: &str) -> Option<f64> {
    numeric_text(raw)?
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(numeric_text(raw)?).ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    OffsetDateTime::parse(trimmed, &Rfc3339)
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(
                trimmed,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
            .ok()
            .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            PrimitiveDateTime::parse(
                trimmed,
                format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            )
            .ok()
            .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
                .ok()
                .map(|date| date.midnight().assume_utc())
        })
}
