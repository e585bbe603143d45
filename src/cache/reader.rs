//! Tiered cache: in-process snapshot, distributed tier, durable store.
//!
//! Reads consult the current snapshot without locking. Misses fall through
//! to the distributed tier and then to a single-key durable fetch. Refresh
//! builds a whole new [`Snapshot`] off to the side and publishes it with one
//! pointer swap, so readers see either the old or the new map and nothing
//! in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::application::repos::{
    DistributedCache, DistributedError, DurableError, DurableStore, NoopDistributedCache,
};
use crate::domain::convert::FromConfigValue;
use crate::domain::error::ReadError;

use super::config::CacheConfig;
use super::error::RefreshError;
use super::keys;
use super::lookup::Lookup;
use super::metrics::{
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL, METRIC_DISTRIBUTED_ERROR_TOTAL,
    METRIC_REFRESH_MS, METRIC_REFRESH_TOTAL, METRIC_SNAPSHOT_ENTRIES,
};
use super::snapshot::Snapshot;
use super::state::{ReaderState, StateCell};

/// Summary of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub generation: u64,
    pub entries: usize,
    pub removed: usize,
    /// Whether the key/value contents differ from the previous snapshot.
    pub changed: bool,
    pub elapsed: Duration,
}

pub struct TieredCache {
    application_name: String,
    config: CacheConfig,
    snapshot: ArcSwap<Snapshot>,
    durable: Arc<dyn DurableStore>,
    /// Replaced by a no-op tier on disposal so the connection is released.
    distributed: ArcSwap<Arc<dyn DistributedCache>>,
    refresh_guard: Mutex<()>,
    state: StateCell,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("application_name", &self.application_name)
            .field("config", &self.config)
            .field("generation", &self.snapshot.load().generation())
            .field("distributed", &self.distributed().backend())
            .field("state", &self.state.get())
            .finish()
    }
}

impl TieredCache {
    /// Perform the mandatory initial load and return a ready cache.
    ///
    /// Fails when the durable store is unreachable or holds no active entry
    /// for `application_name`; no cache exists without a first snapshot.
    #[instrument(skip(config, durable, distributed), fields(distributed = distributed.backend()))]
    pub async fn load(
        application_name: String,
        config: CacheConfig,
        durable: Arc<dyn DurableStore>,
        distributed: Arc<dyn DistributedCache>,
    ) -> Result<Self, DurableError> {
        let state = StateCell::new(ReaderState::Uninitialized);
        state.transition(ReaderState::Loading);

        let started_at = Instant::now();
        let snapshot = fetch_snapshot(durable.as_ref(), &application_name, 1).await?;
        if snapshot.is_empty() {
            return Err(DurableError::EmptyDataset { application_name });
        }
        let entries = snapshot.len();

        let cache = Self {
            application_name,
            config,
            snapshot: ArcSwap::from_pointee(snapshot),
            durable,
            distributed: ArcSwap::from_pointee(distributed),
            refresh_guard: Mutex::new(()),
            state,
        };

        cache.publish(&cache.snapshot.load_full(), &[]).await;
        cache.state.transition(ReaderState::Ready);
        gauge!(METRIC_SNAPSHOT_ENTRIES).set(entries as f64);

        info!(
            application = %cache.application_name,
            entries,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Initial configuration load complete"
        );

        Ok(cache)
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> ReaderState {
        self.state.get()
    }

    pub fn distributed_backend(&self) -> &'static str {
        self.distributed().backend()
    }

    /// The current snapshot. Holding it keeps that generation alive even
    /// after a refresh publishes a newer one.
    pub fn get_all_snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Read `key` through every tier.
    pub async fn get_value<T: FromConfigValue>(&self, key: &str) -> Result<T, ReadError> {
        self.lookup(key)
            .await
            .into_result(&self.application_name, key)
    }

    /// Like [`get_value`](Self::get_value), substituting `default` only when
    /// the key is absent from every tier.
    pub async fn get_value_or<T: FromConfigValue>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ReadError> {
        let lookup = self.lookup(key).await;
        if lookup.is_not_found() {
            debug!(key, "Configuration key not found, returning default value");
        }
        lookup.or_default(default)
    }

    pub async fn try_get_value<T: FromConfigValue>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.found()
    }

    /// Snapshot-only read that never leaves the process.
    pub fn get_cached<T: FromConfigValue>(&self, key: &str) -> Lookup<T> {
        if is_blank(key) {
            return Lookup::NotFound;
        }
        let snapshot = self.snapshot.load();
        match snapshot.get(key) {
            Some(raw) => {
                counter!(METRIC_CACHE_HIT_TOTAL, "tier" => "memory").increment(1);
                convert_raw(key, raw)
            }
            None => Lookup::NotFound,
        }
    }

    /// Read `key` through every tier. Keys match case-insensitively in the
    /// snapshot; a blank key is never found and causes no tier I/O.
    pub async fn lookup<T: FromConfigValue>(&self, key: &str) -> Lookup<T> {
        if is_blank(key) {
            debug!("Blank configuration key requested");
            counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
            return Lookup::NotFound;
        }

        let cached = {
            let snapshot = self.snapshot.load();
            snapshot.get(key).map(|raw| convert_raw(key, raw))
        };
        if let Some(lookup) = cached {
            counter!(METRIC_CACHE_HIT_TOTAL, "tier" => "memory").increment(1);
            return lookup;
        }

        let distributed = self.distributed();
        let distributed_key = keys::entry_key(&self.application_name, key);
        match distributed.get(&distributed_key).await {
            Ok(Some(raw)) => {
                counter!(METRIC_CACHE_HIT_TOTAL, "tier" => "distributed").increment(1);
                return convert_raw(key, &raw);
            }
            Ok(None) => {}
            Err(err) => self.record_distributed_error("get", key, &err),
        }

        match self.durable.fetch_one(&self.application_name, key).await {
            Ok(Some(entry)) if entry.is_visible_to(&self.application_name) => {
                counter!(METRIC_CACHE_HIT_TOTAL, "tier" => "durable").increment(1);
                if let Err(err) = distributed
                    .set(&distributed_key, &entry.value, self.config.distributed_ttl)
                    .await
                {
                    self.record_distributed_error("set", key, &err);
                }
                convert_raw(key, &entry.value)
            }
            Ok(_) => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                Lookup::NotFound
            }
            Err(err) => {
                warn!(
                    application = %self.application_name,
                    key,
                    error = %err,
                    "Durable lookup failed; treating key as absent"
                );
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                Lookup::NotFound
            }
        }
    }

    /// Reload every active entry from the durable store and swap it in.
    ///
    /// Concurrent calls are serialized. On failure the current snapshot stays
    /// in place and the error is returned. An empty result is swapped in like
    /// any other, so deactivating every entry empties the cache.
    #[instrument(skip(self), fields(application = %self.application_name))]
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        if self.state.get() == ReaderState::Disposed {
            return Err(RefreshError::Disposed);
        }

        let _guard = self.refresh_guard.lock().await;
        if self.state.transition(ReaderState::Refreshing) == ReaderState::Disposed {
            return Err(RefreshError::Disposed);
        }

        let started_at = Instant::now();
        let generation = self.snapshot.load().generation() + 1;
        let fetched = fetch_snapshot(self.durable.as_ref(), &self.application_name, generation).await;
        self.state.transition(ReaderState::Ready);

        let next = match fetched {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                error!(error = %err, "Failed to refresh configurations; keeping current snapshot");
                counter!(METRIC_REFRESH_TOTAL, "result" => "error").increment(1);
                histogram!(METRIC_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
                return Err(err.into());
            }
        };

        let previous = self.snapshot.swap(Arc::clone(&next));
        let removed: Vec<&str> = previous.removed_in(&next);
        let report = RefreshReport {
            generation,
            entries: next.len(),
            removed: removed.len(),
            changed: !previous.same_entries(&next),
            elapsed: started_at.elapsed(),
        };

        self.publish(&next, &removed).await;

        counter!(METRIC_REFRESH_TOTAL, "result" => "ok").increment(1);
        histogram!(METRIC_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        gauge!(METRIC_SNAPSHOT_ENTRIES).set(report.entries as f64);

        info!(
            generation,
            entries = report.entries,
            removed = report.removed,
            changed = report.changed,
            "Configuration refresh complete"
        );

        Ok(report)
    }

    /// Drop every distributed key of this application.
    #[instrument(skip(self), fields(application = %self.application_name))]
    pub async fn purge_distributed(&self) -> Result<u64, DistributedError> {
        let prefix = keys::application_prefix(&self.application_name);
        let removed = self
            .distributed()
            .delete_by_prefix(&prefix)
            .await
            .inspect_err(|err| self.record_distributed_error("delete_by_prefix", &prefix, err))?;
        info!(removed, "Purged distributed configuration keys");
        Ok(removed)
    }

    /// Stop accepting refreshes and release the distributed tier. Reads keep
    /// serving the last snapshot.
    pub fn mark_disposed(&self) {
        if self.state.dispose() {
            let noop: Arc<dyn DistributedCache> = Arc::new(NoopDistributedCache);
            self.distributed.store(Arc::new(noop));
            debug!(application = %self.application_name, "Tiered cache disposed");
        }
    }

    fn distributed(&self) -> Arc<dyn DistributedCache> {
        let guard = self.distributed.load();
        let tier: &Arc<dyn DistributedCache> = &guard;
        Arc::clone(tier)
    }

    /// Best-effort copy of `snapshot` into the distributed tier, plus removal
    /// of keys that no longer exist.
    async fn publish(&self, snapshot: &Snapshot, removed: &[&str]) {
        let failures = AtomicUsize::new(0);
        let ttl = self.config.distributed_ttl;
        let distributed = self.distributed();

        stream::iter(snapshot.iter())
            .for_each_concurrent(self.config.publish_concurrency_non_zero(), |(key, value)| {
                let failures = &failures;
                let distributed = &distributed;
                async move {
                    let distributed_key = keys::entry_key(&self.application_name, key);
                    if let Err(err) = distributed.set(&distributed_key, value, ttl).await {
                        failures.fetch_add(1, Ordering::Relaxed);
                        counter!(METRIC_DISTRIBUTED_ERROR_TOTAL, "op" => "set").increment(1);
                        debug!(key, error = %err, "Distributed write failed");
                    }
                }
            })
            .await;

        for key in removed {
            let distributed_key = keys::entry_key(&self.application_name, key);
            if let Err(err) = distributed.delete(&distributed_key).await {
                failures.fetch_add(1, Ordering::Relaxed);
                self.record_distributed_error("delete", key, &err);
            }
        }

        let failures = failures.into_inner();
        if failures > 0 {
            warn!(
                application = %self.application_name,
                backend = distributed.backend(),
                failures,
                "Distributed tier rejected snapshot writes"
            );
        }
    }

    fn record_distributed_error(&self, op: &'static str, key: &str, err: &DistributedError) {
        counter!(METRIC_DISTRIBUTED_ERROR_TOTAL, "op" => op).increment(1);
        warn!(
            application = %self.application_name,
            backend = self.distributed_backend(),
            op,
            key,
            error = %err,
            "Distributed cache operation failed"
        );
    }
}

async fn fetch_snapshot(
    durable: &dyn DurableStore,
    application_name: &str,
    generation: u64,
) -> Result<Snapshot, DurableError> {
    let entries = durable.fetch_active(application_name).await?;
    Ok(Snapshot::build(application_name, entries, generation))
}

fn is_blank(key: &str) -> bool {
    key.trim().is_empty()
}

fn convert_raw<T: FromConfigValue>(key: &str, raw: &str) -> Lookup<T> {
    let result = T::from_config_value(raw).map_err(|err| err.with_key(key));
    if let Err(err) = &result {
        warn!(key, target_type = %err.target, "Stored value does not convert to requested type");
    }
    result.into()
}
