//! Token lifetimes and grant persistence switches

use confique::Config;

/// Token issuance configuration
#[derive(Debug, Config, Clone)]
pub struct TokenConfig {
    /// Authorization code lifetime in seconds (default: 60)
    #[config(env = "AUTHZ_TOKENS_AUTHORIZATION_CODE_LIFETIME", default = 60)]
    pub authorization_code_lifetime: i64,

    /// Access token lifetime in seconds, 0 disables persistence (default: 300)
    #[config(env = "AUTHZ_TOKENS_ACCESS_TOKEN_LIFETIME", default = 300)]
    pub access_token_lifetime: i64,

    /// Long lived access token lifetime in seconds (default: one year)
    #[config(env = "AUTHZ_TOKENS_LONG_LIVED_ACCESS_TOKEN_LIFETIME", default = 31536000)]
    pub long_lived_access_token_lifetime: i64,

    /// Refresh token lifetime in seconds (default: 14400)
    #[config(env = "AUTHZ_TOKENS_REFRESH_TOKEN_LIFETIME", default = 14400)]
    pub refresh_token_lifetime: i64,

    /// ID token lifetime in seconds (default: 3600)
    #[config(env = "AUTHZ_TOKENS_ID_TOKEN_LIFETIME", default = 3600)]
    pub id_token_lifetime: i64,

    /// Keep implicit grants in the cache instead of the directory (default: false)
    #[config(env = "AUTHZ_TOKENS_USE_CACHE_FOR_IMPLICIT_FLOW", default = false)]
    pub use_cache_for_implicit_flow: bool,

    /// Signature algorithm used when a client does not name one (default: HS256)
    #[config(env = "AUTHZ_TOKENS_DEFAULT_SIGNATURE_ALGORITHM", default = "HS256")]
    pub default_signature_algorithm: String,

    /// PEM file holding the RSA or EC private key used for asymmetric ID token signatures
    #[config(env = "AUTHZ_TOKENS_SIGNING_KEY_FILE")]
    pub signing_key_file: Option<String>,

    /// Key id published for the key in `signing_key_file` (default: "default")
    #[config(env = "AUTHZ_TOKENS_SIGNING_KEY_ID", default = "default")]
    pub signing_key_id: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: 60,
            access_token_lifetime: 300,
            long_lived_access_token_lifetime: 31_536_000,
            refresh_token_lifetime: 14_400,
            id_token_lifetime: 3600,
            use_cache_for_implicit_flow: false,
            default_signature_algorithm: "HS256".to_string(),
            signing_key_file: None,
            signing_key_id: "default".to_string(),
        }
    }
}
