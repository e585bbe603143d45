use crate::domain::error::{ConversionError, ReadError};

/// Outcome of a single tiered read.
///
/// Absence and conversion failure are distinct: callers that supply a
/// default only substitute it for [`Lookup::NotFound`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    ConversionFailed(ConversionError),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn into_result(self, application_name: &str, key: &str) -> Result<T, ReadError> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(ReadError::not_found(application_name, key)),
            Self::ConversionFailed(err) => Err(err.into()),
        }
    }

    pub fn or_default(self, default: T) -> Result<T, ReadError> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Ok(default),
            Self::ConversionFailed(err) => Err(err.into()),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Result<T, ConversionError>> for Lookup<T> {
    fn from(result: Result<T, ConversionError>) -> Self {
        match result {
            Ok(value) => Self::Found(value),
            Err(err) => Self::ConversionFailed(err),
        }
    }
}
