use thiserror::Error;

use crate::application::repos::DurableError;
use crate::config::LoadError;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Durable(#[from] DurableError),
    #[error("reader has been disposed")]
    Disposed,
}

/// Failures while constructing a reader. The reader is never handed out
/// without a loaded snapshot.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid reader configuration: {0}")]
    Configuration(#[from] LoadError),
    #[error("initial load failed: {0}")]
    Durable(#[from] DurableError),
}
