//! In-memory adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use confreader::application::repos::{
    DistributedCache, DistributedError, DurableError, DurableStore,
};
use confreader::domain::entities::{ConfigEntry, ConfigValueType};
use tokio::sync::Mutex;

pub const APP: &str = "SERVICE-A";

pub fn entry(key: &str, value: &str) -> ConfigEntry {
    ConfigEntry::new(APP, key, value, ConfigValueType::String)
}

pub fn typed_entry(key: &str, value: &str, value_type: ConfigValueType) -> ConfigEntry {
    ConfigEntry::new(APP, key, value, value_type)
}

/// Durable store over a vector of entries. Failure and latency can be
/// toggled between calls.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<ConfigEntry>>,
    failing: AtomicBool,
    fetch_delay_ms: AtomicUsize,
    fetch_active_calls: AtomicUsize,
    fetch_one_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn with_entries(entries: Vec<ConfigEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            ..Default::default()
        })
    }

    pub async fn replace(&self, entries: Vec<ConfigEntry>) {
        *self.entries.lock().await = entries;
    }

    pub async fn upsert(&self, entry: ConfigEntry) {
        let mut entries = self.entries.lock().await;
        entries.retain(|existing| {
            !(existing.application_name == entry.application_name && existing.key == entry.key)
        });
        entries.push(entry);
    }

    pub async fn deactivate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        for existing in entries.iter_mut().filter(|existing| existing.key == key) {
            existing.active = false;
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn fetch_active_calls(&self) -> usize {
        self.fetch_active_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_one_calls(&self) -> usize {
        self.fetch_one_calls.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) -> Result<(), DurableError> {
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DurableError::unavailable("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn fetch_active(&self, application_name: &str) -> Result<Vec<ConfigEntry>, DurableError> {
        self.fetch_active_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.is_visible_to(application_name))
            .cloned()
            .collect())
    }

    async fn fetch_one(
        &self,
        application_name: &str,
        key: &str,
    ) -> Result<Option<ConfigEntry>, DurableError> {
        self.fetch_one_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .find(|entry| {
                entry.key.eq_ignore_ascii_case(key) && entry.is_visible_to(application_name)
            })
            .cloned())
    }
}

/// Distributed tier backed by a map; TTLs are recorded, not enforced.
#[derive(Default)]
pub struct FakeDistributedCache {
    values: Mutex<HashMap<String, String>>,
    ttls: Mutex<HashMap<String, Duration>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeDistributedCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let cache = Self::default();
        cache.failing.store(true, Ordering::SeqCst);
        Arc::new(cache)
    }

    pub async fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn value(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.ttls.lock().await.get(key).copied()
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DistributedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DistributedError::unavailable("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributedCache for FakeDistributedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DistributedError> {
        self.check()?;
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DistributedError> {
        self.check()?;
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        self.ttls.lock().await.insert(key.to_string(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DistributedError> {
        self.check()?;
        self.values.lock().await.remove(key);
        self.ttls.lock().await.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, DistributedError> {
        self.check()?;
        let mut values = self.values.lock().await;
        let before = values.len();
        values.retain(|key, _| !key.starts_with(prefix));
        Ok((before - values.len()) as u64)
    }

    fn backend(&self) -> &'static str {
        "fake"
    }
}
