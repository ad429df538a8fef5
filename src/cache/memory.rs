//! In-process cache backend.
//!
//! Entries live in a map behind a single `RwLock`, so `clear_all` is atomic with
//! respect to concurrent reads and writes. Expired entries are evicted lazily on
//! read, and in bulk by [`MemoryCache::purge_expired`], which `set` also runs
//! every [`PURGE_EVERY_WRITES`] writes so keys that are never read again do not
//! accumulate.
//!
//! Expiry uses `tokio::time::Instant`, so tests can advance the clock with
//! `tokio::time::advance` under a paused runtime.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::CacheBackend;
use crate::error::CacheError;

// ~30 years; used when `now + ttl` would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

pub const PURGE_EVERY_WRITES: u64 = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    writes: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = (before - entries.len()) as u64;
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict, unless a writer refreshed it in between.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_live(Instant::now()) {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
            debug!(key, "evicted expired cache entry");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY_WRITES == 0 {
            self.purge_expired().await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear_all(&self) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| e.is_live(now)).count() as u64)
    }
}
