//! Tiered cache tuning derived from [`ReaderOptions`](crate::config::ReaderOptions).

use std::time::Duration;

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_DISTRIBUTED_TTL_SECS: u64 = 5 * 60;
const DEFAULT_PUBLISH_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Delay between background full reloads.
    pub refresh_interval: Duration,
    /// Expiry applied to every value written to the distributed tier.
    pub distributed_ttl: Duration,
    /// Maximum in-flight distributed writes while publishing a snapshot.
    pub publish_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            distributed_ttl: Duration::from_secs(DEFAULT_DISTRIBUTED_TTL_SECS),
            publish_concurrency: DEFAULT_PUBLISH_CONCURRENCY,
        }
    }
}

impl From<&crate::config::ReaderOptions> for CacheConfig {
    fn from(options: &crate::config::ReaderOptions) -> Self {
        Self {
            refresh_interval: options.refresh_interval,
            distributed_ttl: options.distributed_cache_ttl,
            ..Default::default()
        }
    }
}

impl CacheConfig {
    /// Publish concurrency clamped to at least one.
    pub fn publish_concurrency_non_zero(&self) -> usize {
        self.publish_concurrency.max(1)
    }
}
