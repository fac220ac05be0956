//! ID token construction

use super::codec::left_half_hash;
use super::signer::{AlgorithmFamily, JwtSigner, SignatureAlgorithm, SigningError, SigningKey};
use super::{AccessToken, AuthorizationCode, IdToken, Token};
use crate::client::Client;
use crate::user::User;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Claims the factory owns; user claims never override them
const RESERVED_CLAIMS: [&str; 11] = [
    "iss", "aud", "sub", "iat", "exp", "auth_time", "nonce", "acr", "sid", "at_hash", "c_hash",
];

/// Everything an ID token is derived from
#[derive(Debug, Clone, Copy)]
pub struct IdTokenRequest<'a> {
    pub client: &'a Client,
    pub user: Option<&'a User>,
    pub authentication_time: Option<DateTime<Utc>>,
    pub nonce: Option<&'a str>,
    pub acr: Option<&'a str>,
    pub session_dn: Option<&'a str>,
    pub authorization_code: Option<&'a AuthorizationCode>,
    pub access_token: Option<&'a AccessToken>,
    pub include_user_claims: bool,
}

/// Builds and signs ID tokens
#[derive(Clone)]
pub struct IdTokenFactory {
    issuer: String,
    lifetime_secs: i64,
    default_algorithm: SignatureAlgorithm,
    asymmetric_key: Option<SigningKey>,
    signer: Arc<dyn JwtSigner>,
}

impl fmt::Debug for IdTokenFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdTokenFactory")
            .field("issuer", &self.issuer)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("default_algorithm", &self.default_algorithm)
            .field("asymmetric_key", &self.asymmetric_key)
            .finish()
    }
}

impl IdTokenFactory {
    pub fn new(
        issuer: impl Into<String>,
        lifetime_secs: i64,
        default_algorithm: SignatureAlgorithm,
        asymmetric_key: Option<SigningKey>,
        signer: Arc<dyn JwtSigner>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            lifetime_secs,
            default_algorithm,
            asymmetric_key,
            signer,
        }
    }

    /// Builds the factory from settings, loading the PEM key file if one is configured
    pub fn from_settings(
        settings: &crate::config::Settings,
        signer: Arc<dyn JwtSigner>,
    ) -> Result<Self, SigningError> {
        let tokens = &settings.tokens;
        let default_algorithm: SignatureAlgorithm = tokens.default_signature_algorithm.parse()?;
        if !default_algorithm.is_signable() {
            return Err(SigningError::UnsupportedAlgorithm(
                default_algorithm.as_str().to_string(),
            ));
        }
        let asymmetric_key = match &tokens.signing_key_file {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    SigningError::InvalidKey(format!("failed to read {}: {}", path, e))
                })?;
                Some(SigningKey::from_pem(&tokens.signing_key_id, pem)?)
            }
            None => None,
        };
        Ok(Self::new(
            settings.issuer.clone(),
            tokens.id_token_lifetime,
            default_algorithm,
            asymmetric_key,
            signer,
        ))
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Algorithm the client asked for, or the server default
    pub fn algorithm_for(&self, client: &Client) -> SignatureAlgorithm {
        client
            .id_token_signed_response_alg
            .unwrap_or(self.default_algorithm)
    }

    fn key_for(
        &self,
        client: &Client,
        algorithm: SignatureAlgorithm,
    ) -> Result<Option<SigningKey>, SigningError> {
        match algorithm.family() {
            AlgorithmFamily::None => Ok(None),
            AlgorithmFamily::Hmac => client
                .client_secret
                .as_ref()
                .filter(|secret| !secret.is_empty())
                .map(|secret| Some(SigningKey::Secret(secret.as_bytes().to_vec())))
                .ok_or(SigningError::MissingKey(algorithm)),
            expected => match &self.asymmetric_key {
                Some(key) if key.family() == expected => Ok(Some(key.clone())),
                Some(_) => Err(SigningError::KeyMismatch {
                    algorithm,
                    expected,
                }),
                None => Err(SigningError::MissingKey(algorithm)),
            },
        }
    }

    /// Claims of the token described by `request`, issued at `issued_at`
    pub fn claims(
        &self,
        request: &IdTokenRequest<'_>,
        algorithm: SignatureAlgorithm,
        issued_at: DateTime<Utc>,
    ) -> Map<String, Value> {
        let mut claims = Map::new();

        if request.include_user_claims {
            if let Some(user) = request.user {
                for (name, value) in &user.claims {
                    if !RESERVED_CLAIMS.contains(&name.as_str()) {
                        claims.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        let subject = request
            .user
            .map(|user| user.user_id.as_str())
            .unwrap_or(request.client.client_id.as_str());
        let expiration = issued_at + Duration::seconds(self.lifetime_secs.max(0));

        claims.insert("iss".to_string(), json!(self.issuer));
        claims.insert("aud".to_string(), json!(request.client.client_id));
        claims.insert("sub".to_string(), json!(subject));
        claims.insert("iat".to_string(), json!(issued_at.timestamp()));
        claims.insert("exp".to_string(), json!(expiration.timestamp()));
        if let Some(auth_time) = request.authentication_time {
            claims.insert("auth_time".to_string(), json!(auth_time.timestamp()));
        }
        if let Some(nonce) = request.nonce.filter(|n| !n.is_empty()) {
            claims.insert("nonce".to_string(), json!(nonce));
        }
        if let Some(acr) = request.acr.filter(|a| !a.is_empty()) {
            claims.insert("acr".to_string(), json!(acr));
        }
        if let Some(session) = request.session_dn.filter(|s| !s.is_empty()) {
            claims.insert("sid".to_string(), json!(session));
        }
        if algorithm != SignatureAlgorithm::None {
            let bits = algorithm.digest_bits();
            if let Some(access_token) = request.access_token {
                claims.insert(
                    "at_hash".to_string(),
                    json!(left_half_hash(&access_token.code, bits)),
                );
            }
            if let Some(code) = request.authorization_code {
                claims.insert("c_hash".to_string(), json!(left_half_hash(&code.code, bits)));
            }
        }
        claims
    }

    /// Signed ID token whose validity window is taken from its `iat`/`exp` claims
    pub fn create(&self, request: &IdTokenRequest<'_>) -> Result<IdToken, SigningError> {
        let algorithm = self.algorithm_for(request.client);
        let key = self.key_for(request.client, algorithm)?;

        let mut header = Map::new();
        header.insert("typ".to_string(), json!("JWT"));
        header.insert("alg".to_string(), json!(algorithm.as_str()));
        if let Some(kid) = key.as_ref().and_then(SigningKey::kid) {
            header.insert("kid".to_string(), json!(kid));
        }

        // whole seconds so the stored dates agree with the claims
        let issued_at = Utc
            .timestamp_opt(Utc::now().timestamp(), 0)
            .single()
            .unwrap_or_else(Utc::now);
        let claims = self.claims(request, algorithm, issued_at);

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(header))?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(claims.clone()))?)
        );
        let signature = match &key {
            Some(key) => self.signer.sign(signing_input.as_bytes(), key, algorithm)?,
            None => String::new(),
        };

        let expiration = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
            .unwrap_or(issued_at);
        let mut token = Token::new(
            format!("{}.{}", signing_input, signature),
            issued_at,
            expiration,
        );
        token.auth_mode = request.acr.map(str::to_string);
        token.session_dn = request.session_dn.map(str::to_string);
        Ok(IdToken(token))
    }
}
