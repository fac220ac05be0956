use super::GrantType;
use crate::client::Client;
use crate::token::AuthorizationCode;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached snapshot of a grant kept without directory rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheGrant {
    pub grant_id: String,
    pub grant_type: GrantType,
    pub client: Client,
    pub user: Option<User>,
    pub authentication_time: Option<DateTime<Utc>>,
    pub authorization_code: Option<AuthorizationCode>,
    pub nonce: Option<String>,
    pub scopes: Vec<String>,
    pub acr_values: Option<String>,
    pub session_dn: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub jwt_request: Option<String>,
    pub claims: Option<String>,
}

impl CacheGrant {
    /// Key of the cache entry holding the code grant for `(client_id, code)`
    pub fn cache_key(client_id: &str, code: &str) -> String {
        format!("{}_{}", client_id, code)
    }

    /// Key of this snapshot: client and code when a code exists, the grant id otherwise
    pub fn key(&self) -> String {
        match &self.authorization_code {
            Some(code) => Self::cache_key(&self.client.client_id, &code.code),
            None => self.grant_id.clone(),
        }
    }

    /// Seconds the entry should live: what is left of the code, else `fallback_secs`
    pub fn expires_in(&self, fallback_secs: i64) -> i64 {
        match &self.authorization_code {
            Some(code) => code.expires_in(),
            None => fallback_secs,
        }
    }
}
