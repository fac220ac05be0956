pub use crate::config::cache::{CacheConfig, CacheStore};
pub use crate::config::directory::{BaseDnConfig, CleanupConfig, ExtraSweepConfig};
pub use crate::config::tokens::TokenConfig;
pub use crate::config::uma::UmaConfig;
use confique::Config;

pub mod cache;
pub mod directory;
pub mod tokens;
pub mod uma;

/// Environment variable naming an optional TOML file layered under the environment
pub const CONFIG_FILE_ENV: &str = "AUTHZ_CONFIG_FILE";

/// Main configuration structure for the grant server
#[derive(Debug, Config, Clone)]
pub struct Settings {
    /// Issuer identifier placed in signed tokens
    #[config(env = "AUTHZ_ISSUER", default = "https://localhost")]
    pub issuer: String,

    /// Cache configuration
    #[config(nested)]
    pub cache: CacheConfig,

    /// Token lifetimes and persistence switches
    #[config(nested)]
    pub tokens: TokenConfig,

    /// UMA configuration
    #[config(nested)]
    pub uma: UmaConfig,

    /// Directory layout
    #[config(nested)]
    pub base_dn: BaseDnConfig,

    /// Cleanup timer configuration
    #[config(nested)]
    pub cleanup: CleanupConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            issuer: "https://localhost".to_string(),
            cache: CacheConfig::default(),
            tokens: TokenConfig::default(),
            uma: UmaConfig::default(),
            base_dn: BaseDnConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Settings {
    /// Loads the settings from `AUTHZ_*` environment variables, layered over the
    /// TOML file named by `AUTHZ_CONFIG_FILE` when it is set.
    pub fn new() -> Result<Self, confique::Error> {
        let mut builder = Self::builder().env();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.file(path);
        }
        builder.load()
    }
}
