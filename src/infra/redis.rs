//! Redis-backed distributed tier.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::info;

use crate::application::repos::{DistributedCache, DistributedError};

const SCAN_COUNT: usize = 500;

/// Distributed cache over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Open the connection eagerly so a bad URL or unreachable server is
    /// reported at startup.
    pub async fn connect(url: &str) -> Result<Self, DistributedError> {
        let client = Client::open(url).map_err(DistributedError::unavailable)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(DistributedError::unavailable)?;
        info!("Redis connection established");
        Ok(Self { manager })
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DistributedError> {
        let mut conn = self.manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(DistributedError::unavailable)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DistributedError> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(DistributedError::unavailable)
    }

    async fn delete(&self, key: &str) -> Result<(), DistributedError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(DistributedError::unavailable)
    }

    /// Walks the keyspace with `SCAN` rather than `KEYS` so large keyspaces
    /// are not blocked; each page is deleted as it arrives.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, DistributedError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.manager.clone();
        let mut cursor = 0u64;
        let mut removed = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(DistributedError::unavailable)?;

            if !keys.is_empty() {
                let count: u64 = conn
                    .del(keys)
                    .await
                    .map_err(DistributedError::unavailable)?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Escape Redis glob metacharacters so `prefix` matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("config:SERVICE-A:"), "config:SERVICE-A:");
        assert_eq!(escape_glob("config:a*b?[c]:"), "config:a\\*b\\?\\[c\\]:");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn live_round_trip_and_prefix_delete() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let cache = RedisCache::connect(&url).await.expect("redis connection");

        cache
            .set("config:LIVE-TEST:a", "1", Duration::from_secs(30))
            .await
            .expect("set a");
        cache
            .set("config:LIVE-TEST:b", "2", Duration::from_secs(30))
            .await
            .expect("set b");
        assert_eq!(
            cache.get("config:LIVE-TEST:a").await.expect("get"),
            Some("1".to_string())
        );

        let removed = cache
            .delete_by_prefix("config:LIVE-TEST:")
            .await
            .expect("prefix delete");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("config:LIVE-TEST:b").await.expect("get"), None);
    }
}
