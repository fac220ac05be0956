use crate::cache::CacheError;
use crate::store::StoreError;
use crate::token::signer::SigningError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod authorization_grant;
pub mod cache_grant;
pub mod list;
pub mod record;
pub mod service;

pub use authorization_grant::{AuthenticationContext, AuthorizationGrant, GrantContext, GrantKind};
pub use cache_grant::CacheGrant;
pub use list::AuthorizationGrantList;
pub use record::TokenRecord;
pub use service::GrantService;

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("Unknown grant type: {0}")]
    UnknownGrantType(String),
    #[error("Grant caching is not supported for: {0}")]
    UnsupportedCaching(GrantType),
    #[error("Client not found: {0}")]
    ClientNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// OAuth grant types the engine can issue tokens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Implicit,
    ClientCredentials,
    #[serde(rename = "password")]
    ResourceOwnerPasswordCredentials,
}

impl GrantType {
    /// Value of the `grant_type` parameter, also the stored tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::ClientCredentials => "client_credentials",
            Self::ResourceOwnerPasswordCredentials => "password",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = GrantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "implicit" => Ok(Self::Implicit),
            "client_credentials" => Ok(Self::ClientCredentials),
            "password" => Ok(Self::ResourceOwnerPasswordCredentials),
            other => Err(GrantError::UnknownGrantType(other.to_string())),
        }
    }
}

/// Where a grant keeps its state between requests.
///
/// Chosen once, when the grant is created or restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Cache entry only, no directory rows. Authorization code grants only.
    CacheOnly,
    /// Implicit grant kept in the cache because implicit flow caching is enabled
    ImplicitCache,
    /// Token rows in the directory, updated together on save
    Durable,
}

impl PersistenceMode {
    /// Mode of a new grant of `grant_type`
    pub fn resolve(grant_type: GrantType, use_cache_for_implicit_flow: bool) -> Self {
        if use_cache_for_implicit_flow && grant_type == GrantType::Implicit {
            Self::ImplicitCache
        } else {
            Self::Durable
        }
    }
}
