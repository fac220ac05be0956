use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod null;
pub mod redis;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Cache trait defining the interface for all cache implementations.
///
/// Entries are keyed by plain strings. Short lived objects such as authorization code
/// grants carry their own TTL through [`CacheBackend::set_with_ttl`]; everything else
/// uses the backend's default TTL.
///
/// Implementations of this trait should be thread-safe (Send + Sync)
/// and cloneable to support sharing across services.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store a value in the cache with default TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T)
        -> Result<(), CacheError>;

    /// Store a value in the cache expiring after `ttl`
    async fn set_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Retrieve a value from the cache
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError>;

    /// Performs a health check on the cache backend
    ///
    /// For Redis, this will ping the server. The memory and null caches are always healthy.
    async fn health_check(&self) -> Result<(), String>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache implementation that provides a uniform interface regardless of backend.
///
/// The concrete implementation is chosen at runtime based on the application configuration.
#[derive(Clone)]
pub enum Cache {
    /// In-memory cache implementation using Moka
    InMemory(memory::InMemoryCache),
    /// Redis-based cache implementation
    Redis(redis::RedisCache),
    /// No-op cache implementation that doesn't actually cache anything
    Null(null::NullCache),
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory(_) => f.write_str("Cache::InMemory"),
            Self::Redis(_) => f.write_str("Cache::Redis"),
            Self::Null(_) => f.write_str("Cache::Null"),
        }
    }
}

#[async_trait::async_trait]
impl CacheBackend for Cache {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.set(key, value).await,
            Self::Redis(cache) => cache.set(key, value).await,
            Self::Null(cache) => cache.set(key, value).await,
        }
    }

    async fn set_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.set_with_ttl(key, value, ttl).await,
            Self::Redis(cache) => cache.set_with_ttl(key, value, ttl).await,
            Self::Null(cache) => cache.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self {
            Self::InMemory(cache) => cache.get(key).await,
            Self::Redis(cache) => cache.get(key).await,
            Self::Null(cache) => cache.get(key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(cache) => cache.health_check().await,
            Self::Redis(cache) => cache.health_check().await,
            Self::Null(cache) => cache.health_check().await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.delete(key).await,
            Self::Redis(cache) => cache.delete(key).await,
            Self::Null(cache) => cache.delete(key).await,
        }
    }
}

/// Reads `key`, retrying exactly once on a miss.
///
/// Under load a replicated cache may not yet expose an entry written a moment ago.
/// A second miss is final; errors are not retried.
pub async fn get_with_single_retry<C, T>(cache: &C, key: &str) -> Result<Option<T>, CacheError>
where
    C: CacheBackend,
    T: DeserializeOwned + Send + Sync,
{
    if let Some(value) = cache.get(key).await? {
        return Ok(Some(value));
    }
    log::trace!("Cache miss for key {}, retrying once", key);
    cache.get(key).await
}

/// Factory function to create the appropriate cache implementation based on configuration.
///
/// # Returns
///
/// Returns a `Result` containing either:
/// - A `Cache` enum wrapping the selected cache implementation
/// - A `CacheError` if initialization fails
pub async fn create_cache(config: &crate::config::Settings) -> Result<Cache, CacheError> {
    match config.cache.store {
        crate::config::CacheStore::InMemory => {
            let cache =
                memory::InMemoryCache::new(config.cache.ttl as u64, config.cache.memory.capacity)
                    .map_err(CacheError::Config)?;
            Ok(Cache::InMemory(cache))
        }
        crate::config::CacheStore::Redis => {
            if config.cache.redis.url.is_empty() {
                return Err(CacheError::Config(
                    "Redis URL is required for Redis cache".to_string(),
                ));
            }
            let cache = redis::RedisCache::new(&config.cache.redis.url, config.cache.ttl as u64)
                .await
                .map_err(CacheError::Config)?;
            Ok(Cache::Redis(cache))
        }
        crate::config::CacheStore::None => {
            let cache = null::NullCache::new();
            Ok(Cache::Null(cache))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::memory::InMemoryCache;
    use serde::{Deserialize, Serialize};
    use crate::test_utils::LaggingCache;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct TestValue {
        field: String,
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let memory_cache = InMemoryCache::new(60, 128).expect("Failed to create cache");
        let cache = Cache::InMemory(memory_cache);

        let test_value = TestValue {
            field: "test_value".to_string(),
        };
        cache
            .set("test_key", &test_value)
            .await
            .expect("Failed to set value");
        let value: Option<TestValue> = cache.get("test_key").await.expect("Failed to get value");
        assert_eq!(value, Some(test_value));

        let value: Option<TestValue> = cache
            .get("non_existent")
            .await
            .expect("Failed to get value");
        assert_eq!(value, None);

        cache
            .delete("test_key")
            .await
            .expect("Failed to delete value");
        let value: Option<TestValue> = cache.get("test_key").await.expect("Failed to get value");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_single_miss() {
        let cache = LaggingCache::new(1);
        let value = TestValue {
            field: "grant".to_string(),
        };
        cache.set("client_code", &value).await.unwrap();

        let found: Option<TestValue> = get_with_single_retry(&cache, "client_code")
            .await
            .unwrap();
        assert_eq!(found, Some(value));
        assert_eq!(cache.reads(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_miss() {
        let cache = LaggingCache::new(2);
        cache
            .set(
                "client_code",
                &TestValue {
                    field: "grant".to_string(),
                },
            )
            .await
            .unwrap();

        let found: Option<TestValue> = get_with_single_retry(&cache, "client_code")
            .await
            .unwrap();
        assert_eq!(found, None);
        assert_eq!(cache.reads(), 2, "exactly one retry");
    }

    #[tokio::test]
    async fn test_retry_not_needed_on_hit() {
        let cache = LaggingCache::new(0);
        cache
            .set(
                "client_code",
                &TestValue {
                    field: "grant".to_string(),
                },
            )
            .await
            .unwrap();

        let found: Option<TestValue> = get_with_single_retry(&cache, "client_code")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(cache.reads(), 1);
    }

    #[tokio::test]
    async fn test_create_cache_requires_redis_url() {
        let mut settings = crate::config::Settings::default();
        settings.cache.store = crate::config::CacheStore::Redis;
        settings.cache.redis.url = String::new();

        let result = create_cache(&settings).await;
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_create_null_cache() {
        let mut settings = crate::config::Settings::default();
        settings.cache.store = crate::config::CacheStore::None;

        let cache = create_cache(&settings).await.unwrap();
        assert!(matches!(cache, Cache::Null(_)));
    }
}
