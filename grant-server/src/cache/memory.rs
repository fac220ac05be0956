use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};

/// Serialized payload together with the lifetime it was stored with
#[derive(Clone)]
struct CachedEntry {
    payload: String,
    ttl: Duration,
}

/// Expires every entry after its own TTL
struct PerEntryExpiry;

impl Expiry<String, CachedEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CachedEntry>,
    ttl: Duration,
}

impl InMemoryCache {
    /// Initialize a new in-memory cache instance
    pub fn new(ttl_secs: u64, capacity_mib: usize) -> Result<Self, String> {
        // Convert MiB to bytes for max_capacity (1 MiB = 1024 * 1024 bytes)
        let max_capacity_bytes: u64 = capacity_mib
            .checked_mul(1024 * 1024)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| format!("Capacity overflow: {} MiB", capacity_mib))?;

        let cache = MokaCache::builder()
            .expire_after(PerEntryExpiry)
            .weigher(|_key, value: &CachedEntry| -> u32 {
                value.payload.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .build();

        Ok(Self {
            cache,
            ttl: Duration::from_secs(ttl_secs),
        })
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, self.ttl).await
    }

    async fn set_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.cache
            .insert(key.to_string(), CachedEntry { payload, ttl })
            .await;
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        if let Some(entry) = self.cache.get(key).await {
            serde_json::from_str(&entry.payload)
                .map_err(|e| CacheError::Deserialization(e.to_string()))
                .map(Some)
        } else {
            Ok(None)
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.remove(key).await;
        Ok(())
    }
}
