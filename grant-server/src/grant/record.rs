use crate::store::Entry;
use crate::token::{Token, TokenType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TOKEN_CODE: &str = "tokenCode";
pub const GRANT_ID: &str = "grantId";
pub const EXPIRATION_DATE: &str = "expirationDate";

/// Directory row for one token of a grant.
///
/// Every row repeats the grant's metadata so any single row is enough to rebuild
/// the grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub dn: String,
    #[serde(rename = "uniqueIdentifier")]
    pub id: String,
    pub grant_id: String,
    pub creation_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    /// Hash of the token code
    pub token_code: String,
    pub token_type: TokenType,
    /// Stored grant type tag
    pub grant_type: String,
    pub client_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Space separated scopes
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub auth_mode: Option<String>,
    #[serde(default)]
    pub session_dn: Option<String>,
    #[serde(default)]
    pub authentication_time: Option<DateTime<Utc>>,
    /// Hash of the authorization code the grant was issued for
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    #[serde(default)]
    pub jwt_request: Option<String>,
    #[serde(default)]
    pub claims: Option<String>,
}

impl Entry for TokenRecord {
    const OBJECT_CLASS: &'static str = "authzToken";

    fn dn(&self) -> &str {
        &self.dn
    }
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }

    /// Token value rebuilt from the row; `code` is the stored hash
    pub fn to_token(&self) -> Token {
        let mut token = Token::new(
            self.token_code.clone(),
            self.creation_date,
            self.expiration_date,
        );
        token.auth_mode = self.auth_mode.clone();
        token.session_dn = self.session_dn.clone();
        token.hashed = true;
        token
    }
}
