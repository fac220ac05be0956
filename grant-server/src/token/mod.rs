use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

pub mod codec;
pub mod id_token;
pub mod signer;

/// A token issued by a grant.
///
/// `code` is the plain value handed to the client. Persisted records only ever
/// carry its hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub code: String,
    pub creation_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dn: Option<String>,
    /// Set on tokens rebuilt from a stored row, whose `code` is already the hash
    #[serde(default)]
    pub hashed: bool,
}

impl Token {
    /// Fresh token with a random code, valid for `lifetime_secs` from now
    pub fn generate(lifetime_secs: i64) -> Self {
        Self::with_code(codec::generate_code(), lifetime_secs)
    }

    pub fn with_code(code: String, lifetime_secs: i64) -> Self {
        let creation_date = Utc::now();
        Self::new(
            code,
            creation_date,
            creation_date + Duration::seconds(lifetime_secs.max(0)),
        )
    }

    pub fn new(code: String, creation_date: DateTime<Utc>, expiration_date: DateTime<Utc>) -> Self {
        Self {
            code,
            creation_date,
            expiration_date,
            auth_mode: None,
            session_dn: None,
            hashed: false,
        }
    }

    /// Value kept in directory rows for this token
    pub fn stored_code(&self) -> String {
        if self.hashed {
            self.code.clone()
        } else {
            codec::hash_code(&self.code)
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expiration_date
    }

    /// Whole seconds left before expiry, 0 once expired
    pub fn expires_in(&self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        (self.expiration_date - Utc::now()).num_seconds().max(0)
    }
}

macro_rules! token_variant {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Token);

        impl $name {
            pub fn generate(lifetime_secs: i64) -> Self {
                Self(Token::generate(lifetime_secs))
            }

            pub fn into_token(self) -> Token {
                self.0
            }
        }

        impl From<Token> for $name {
            fn from(token: Token) -> Self {
                Self(token)
            }
        }

        impl Deref for $name {
            type Target = Token;

            fn deref(&self) -> &Token {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Token {
                &mut self.0
            }
        }
    };
}

token_variant!(
    /// Short lived code exchanged for tokens at the token endpoint
    AuthorizationCode
);
token_variant!(AccessToken);
token_variant!(RefreshToken);
token_variant!(
    /// Signed JWT; `code` holds the compact serialization
    IdToken
);

/// Kind of token a persisted record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    AuthorizationCode,
    AccessToken,
    LongLivedAccessToken,
    RefreshToken,
    IdToken,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::AccessToken => "access_token",
            Self::LongLivedAccessToken => "long_lived_access_token",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
