use confique::Config;
use serde::Deserialize;

/// Base DNs of the directory branches the engine reads and writes
#[derive(Debug, Config, Clone)]
pub struct BaseDnConfig {
    /// Branch holding clients, their tokens, tickets and RPTs
    #[config(env = "AUTHZ_BASE_DN_CLIENTS", default = "ou=clients,o=authz")]
    pub clients: String,

    /// Branch holding people
    #[config(env = "AUTHZ_BASE_DN_PEOPLE", default = "ou=people,o=authz")]
    pub people: String,

    /// UMA branch holding resources, scopes and PCTs
    #[config(env = "AUTHZ_BASE_DN_UMA", default = "ou=uma,o=authz")]
    pub uma_base: String,

    /// Branch holding sector identifiers
    #[config(
        env = "AUTHZ_BASE_DN_SECTOR_IDENTIFIERS",
        default = "ou=sector_identifiers,o=authz"
    )]
    pub sector_identifiers: String,
}

impl Default for BaseDnConfig {
    fn default() -> Self {
        Self {
            clients: "ou=clients,o=authz".to_string(),
            people: "ou=people,o=authz".to_string(),
            uma_base: "ou=uma,o=authz".to_string(),
            sector_identifiers: "ou=sector_identifiers,o=authz".to_string(),
        }
    }
}

/// Cleanup timer configuration
#[derive(Debug, Config, Clone)]
pub struct CleanupConfig {
    /// Seconds between two cleanup sweeps, values <= 0 fall back to 600
    #[config(env = "AUTHZ_CLEANUP_INTERVAL", default = 600)]
    pub interval: i64,

    /// Number of entries fetched per sweep batch (default: 100)
    #[config(env = "AUTHZ_CLEANUP_BATCH_SIZE", default = 100)]
    pub batch_size: usize,

    /// Expiry sweeps over further object classes, run after the UMA sweeps
    #[config(default = [])]
    pub extra_sweeps: Vec<ExtraSweepConfig>,
}

/// Removes entries of one object class whose date attribute lies `retention` seconds in the past
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtraSweepConfig {
    pub base_dn: String,
    pub object_class: String,
    pub date_attribute: String,
    #[serde(default)]
    pub retention: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: 600,
            batch_size: 100,
            extra_sweeps: Vec::new(),
        }
    }
}

impl CleanupConfig {
    /// Effective interval in seconds
    pub fn interval_secs(&self) -> u64 {
        if self.interval <= 0 {
            600
        } else {
            self.interval as u64
        }
    }
}
