use confique::Config;
use serde::Deserialize;

/// Specifies which cache store implementation to use
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    #[default]
    InMemory,
    Redis,
    #[serde(other)]
    None,
}

/// Configuration for the caching subsystem
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Default cache TTL in seconds, used when an entry carries no TTL of its own (default: 3600)
    #[config(env = "AUTHZ_CACHE_TTL", default = 3600)]
    pub ttl: u32,

    /// Cache store type: "in-memory" (default), "redis" or "none"
    #[config(env = "AUTHZ_CACHE_STORE", default = "in-memory")]
    pub store: CacheStore,

    /// In-memory cache specific configuration
    #[config(nested)]
    pub memory: InMemoryConfig,

    /// Redis cache specific configuration
    #[config(nested)]
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: 3600, // 1 hour
            store: CacheStore::InMemory,
            memory: InMemoryConfig::default(),
            redis: RedisConfig::default(),
        }
    }
}

/// In-memory cache configuration options
#[derive(Debug, Config, Clone)]
pub struct InMemoryConfig {
    /// Maximum capacity in MiB (default: 128 MiB)
    #[config(env = "AUTHZ_CACHE_MEMORY_CAPACITY", default = 128)]
    pub capacity: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 128, // 128 MiB
        }
    }
}

/// Redis cache configuration options
#[derive(Debug, Config, Clone, Default)]
pub struct RedisConfig {
    /// Redis connection string
    #[config(env = "AUTHZ_CACHE_REDIS_URL", default = "")]
    pub url: String,
}
