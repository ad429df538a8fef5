//! Redis cache backend.
//!
//! Uses a `ConnectionManager` so a dropped connection is re-established on the
//! next command. Values are stored with `PSETEX`; Redis enforces the TTL itself,
//! to the millisecond. `clear_all` and `entry_count` walk keys under [`KEY_PREFIX`]
//! with `SCAN`, so the backend can share a database with other applications
//! without blocking them.

use ::redis::{AsyncCommands, Client, aio::ConnectionManager};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{CacheBackend, KEY_PREFIX};
use crate::error::CacheError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    redis_url: String,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("redis_url", &self.redis_url)
            .field("conn_manager", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Connect to `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        Self::connect_with_timeout(redis_url, DEFAULT_CONNECT_TIMEOUT).await
    }

    #[instrument(level = "info", skip_all, fields(redis_url = %redis_url))]
    pub async fn connect_with_timeout(
        redis_url: &str,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn_manager = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(CacheError::Unavailable(format!(
                    "timed out after {}ms connecting to {redis_url}",
                    timeout.as_millis()
                )));
            }
        };
        info!("Redis connection manager initialized");
        Ok(Self {
            conn_manager,
            redis_url: redis_url.to_string(),
        })
    }

    /// Every key under [`KEY_PREFIX`], collected with incremental `SCAN`.
    async fn prefixed_keys(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let mut iter = conn.scan_match::<_, String>(format!("{KEY_PREFIX}*")).await?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

/// `PSETEX` rejects a zero expiry, so sub-millisecond TTLs round up to 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.conn_manager.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
        debug!(key, ttl_ms, "redis PSETEX");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn_manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn clear_all(&self) -> Result<u64, CacheError> {
        let keys = self.prefixed_keys().await?;
        if keys.is_empty() {
            return Ok(0);
        }
        // a single multi-key DEL is atomic on the server
        let mut conn = self.conn_manager.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        Ok(self.prefixed_keys().await?.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_keeps_sub_second_precision() {
        assert_eq!(ttl_millis(Duration::from_millis(250)), 250);
        assert_eq!(ttl_millis(Duration::from_secs(3600)), 3_600_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisCache::connect("not a url").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_unreachable_fails() {
        let result =
            RedisCache::connect_with_timeout("redis://127.0.0.1:1", Duration::from_millis(500))
                .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a local redis server"]
    async fn test_round_trip_against_local_redis() {
        let cache = RedisCache::connect("redis://127.0.0.1:6379").await.unwrap();
        cache.ping().await.unwrap();

        let key = format!("{KEY_PREFIX}test-round-trip");
        cache.set(&key, "<html></html>", Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some("<html></html>".to_string()));
        assert!(cache.entry_count().await.unwrap() >= 1);
        assert!(cache.delete(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a local redis server"]
    async fn test_sub_second_ttl_and_scan_clear_against_local_redis() {
        let cache = RedisCache::connect("redis://127.0.0.1:6379").await.unwrap();

        let short = format!("{KEY_PREFIX}test-short-ttl");
        cache.set(&short, "x", Duration::from_millis(200)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get(&short).await.unwrap(), None);

        for i in 0..3 {
            let key = format!("{KEY_PREFIX}test-scan-{i}");
            cache.set(&key, "y", Duration::from_secs(30)).await.unwrap();
        }
        assert!(cache.clear_all().await.unwrap() >= 3);
        assert_eq!(cache.entry_count().await.unwrap(), 0);
    }
}
