use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::repos::{DistributedError, DurableError},
    cache::{InitError, RefreshError},
    config::LoadError,
    domain::error::{ConversionError, DomainError, ReadError},
    infra::error::InfraError,
};

/// Top-level failure of a `confreader` command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error(transparent)]
    Durable(#[from] DurableError),
    #[error(transparent)]
    Distributed(#[from] DistributedError),
    #[error("configuration `{0}` not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Process exit code: 2 for bad input, 3 for missing keys, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_)
            | AppError::Domain(DomainError::Validation { .. })
            | AppError::Validation(_)
            | AppError::Init(InitError::Configuration(_))
            | AppError::Read(ReadError::Conversion(_)) => 2,
            AppError::NotFound(_) | AppError::Read(ReadError::NotFound { .. }) => 3,
            _ => 1,
        }
    }

    /// The error and each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if messages.last() != Some(&message) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        Self::Read(err.into())
    }
}
