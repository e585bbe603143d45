//! Adapter traits describing the durable store and the distributed cache tier.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::ConfigEntry;

/// Failures of the durable (source of truth) tier.
#[derive(Debug, Error)]
pub enum DurableError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
    #[error("durable store returned no active entries for application `{application_name}`")]
    EmptyDataset { application_name: String },
    #[error("durable store query failed: {message}")]
    Query { message: String },
}

impl DurableError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Failures of the distributed tier. Never surfaced past the read path.
#[derive(Debug, Error)]
pub enum DistributedError {
    #[error("distributed cache unavailable: {0}")]
    Unavailable(String),
}

impl DistributedError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Persistent storage of configuration entries.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Full scan of the active entries owned by `application_name`.
    async fn fetch_active(&self, application_name: &str) -> Result<Vec<ConfigEntry>, DurableError>;

    /// Single active entry lookup used on a cache miss.
    async fn fetch_one(
        &self,
        application_name: &str,
        key: &str,
    ) -> Result<Option<ConfigEntry>, DurableError>;
}

/// Shared string cache with expiry, e.g. Redis.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, DistributedError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DistributedError>;

    async fn delete(&self, key: &str) -> Result<(), DistributedError>;

    /// Remove every key starting with `prefix`, returning how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, DistributedError>;

    /// Short label used in logs and metrics.
    fn backend(&self) -> &'static str;
}

/// Stand-in for an unconfigured distributed tier: always misses, always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDistributedCache;

#[async_trait]
impl DistributedCache for NoopDistributedCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, DistributedError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), DistributedError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), DistributedError> {
        Ok(())
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> Result<u64, DistributedError> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "noop"
    }
}
