//! [`ConfigReader`]: the embeddable entry point wiring adapters, the tiered
//! cache and its refresh loop together.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::repos::{
    DistributedCache, DistributedError, DurableError, DurableStore, NoopDistributedCache,
};
use crate::config::ReaderOptions;
use crate::domain::convert::FromConfigValue;
use crate::domain::error::ReadError;
use crate::infra::db::PostgresRepositories;
use crate::infra::redis::RedisCache;
use crate::infra::telemetry;

use super::config::CacheConfig;
use super::error::{InitError, RefreshError};
use super::lookup::Lookup;
use super::reader::{RefreshReport, TieredCache};
use super::scheduler::RefreshScheduler;
use super::snapshot::Snapshot;
use super::state::ReaderState;

/// A loaded tiered cache plus the task keeping it fresh.
#[derive(Debug)]
pub struct ConfigReader {
    cache: Arc<TieredCache>,
    scheduler: Option<RefreshScheduler>,
}

impl ConfigReader {
    /// Connect to Postgres (and Redis when configured), load the first
    /// snapshot and start the refresh loop.
    pub async fn connect(options: ReaderOptions) -> Result<Self, InitError> {
        options.validate()?;
        if options.enable_logging {
            telemetry::try_init_console();
        }

        let pool = PostgresRepositories::connect(
            &options.durable_store_connection,
            options.max_connections.get(),
        )
        .await
        .map_err(DurableError::unavailable)?;
        let durable: Arc<dyn DurableStore> = Arc::new(PostgresRepositories::new(pool));

        let distributed = match options.distributed_cache_connection.as_deref() {
            Some(url) => connect_distributed(url).await,
            None => Arc::new(NoopDistributedCache) as Arc<dyn DistributedCache>,
        };

        Self::with_adapters(options, durable, distributed).await
    }

    /// Build a reader over caller-supplied adapters.
    pub async fn with_adapters(
        options: ReaderOptions,
        durable: Arc<dyn DurableStore>,
        distributed: Arc<dyn DistributedCache>,
    ) -> Result<Self, InitError> {
        options.validate()?;
        let config = CacheConfig::from(&options);
        let interval = config.refresh_interval;

        let cache = Arc::new(
            TieredCache::load(options.application_name, config, durable, distributed).await?,
        );
        let scheduler = RefreshScheduler::spawn(Arc::clone(&cache), interval);

        Ok(Self {
            cache,
            scheduler: Some(scheduler),
        })
    }

    /// Shared handle to the underlying cache. Once the reader is shut down or
    /// dropped, the handle keeps answering from the last snapshot but no
    /// longer holds the distributed connection.
    pub fn cache(&self) -> Arc<TieredCache> {
        Arc::clone(&self.cache)
    }

    pub fn application_name(&self) -> &str {
        self.cache.application_name()
    }

    pub fn state(&self) -> ReaderState {
        self.cache.state()
    }

    pub async fn get_value<T: FromConfigValue>(&self, key: &str) -> Result<T, ReadError> {
        self.cache.get_value(key).await
    }

    pub async fn get_value_or<T: FromConfigValue>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ReadError> {
        self.cache.get_value_or(key, default).await
    }

    pub async fn try_get_value<T: FromConfigValue>(&self, key: &str) -> Option<T> {
        self.cache.try_get_value(key).await
    }

    pub async fn lookup<T: FromConfigValue>(&self, key: &str) -> Lookup<T> {
        self.cache.lookup(key).await
    }

    pub fn get_cached<T: FromConfigValue>(&self, key: &str) -> Lookup<T> {
        self.cache.get_cached(key)
    }

    pub fn get_all_snapshot(&self) -> Arc<Snapshot> {
        self.cache.get_all_snapshot()
    }

    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        self.cache.refresh().await
    }

    pub async fn purge_distributed(&self) -> Result<u64, DistributedError> {
        self.cache.purge_distributed().await
    }

    /// Stop the refresh loop, dispose the cache and release the distributed
    /// connection. Reads on outstanding [`cache`](Self::cache) handles keep
    /// serving the last snapshot.
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
        self.cache.mark_disposed();
        info!(application = %self.cache.application_name(), "Configuration reader shut down");
    }
}

impl Drop for ConfigReader {
    fn drop(&mut self) {
        self.cache.mark_disposed();
    }
}

async fn connect_distributed(url: &str) -> Arc<dyn DistributedCache> {
    match RedisCache::connect(url).await {
        Ok(cache) => Arc::new(cache),
        Err(err) => {
            warn!(error = %err, "Failed to connect to Redis, continuing without distributed cache");
            Arc::new(NoopDistributedCache)
        }
    }
}
