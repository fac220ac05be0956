//! JWS signing capability used for ID tokens

use jsonwebtoken::{Algorithm, EncodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Algorithm {algorithm} requires a {expected:?} key")]
    KeyMismatch {
        algorithm: SignatureAlgorithm,
        expected: AlgorithmFamily,
    },
    #[error("No signing key available for {0}")]
    MissingKey(SignatureAlgorithm),
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
    #[error("Failed to sign: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Shape of key an algorithm needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    None,
    Hmac,
    Rsa,
    Ec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "none")]
    None,
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    /// Parsed and reported as EC, but the JWT backend cannot sign with P-521 keys
    ES512,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::None => AlgorithmFamily::None,
            Self::HS256 | Self::HS384 | Self::HS512 => AlgorithmFamily::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 => AlgorithmFamily::Rsa,
            Self::ES256 | Self::ES384 | Self::ES512 => AlgorithmFamily::Ec,
        }
    }

    /// Digest size backing the algorithm, also used for `at_hash`/`c_hash`
    pub fn digest_bits(&self) -> u16 {
        match self {
            Self::HS384 | Self::RS384 | Self::ES384 => 384,
            Self::HS512 | Self::RS512 | Self::ES512 => 512,
            _ => 256,
        }
    }

    /// Whether [`DefaultJwtSigner`] can produce signatures for this algorithm
    pub fn is_signable(&self) -> bool {
        *self == Self::None || self.to_jwt_algorithm().is_ok()
    }

    fn to_jwt_algorithm(self) -> Result<Algorithm, SigningError> {
        match self {
            Self::HS256 => Ok(Algorithm::HS256),
            Self::HS384 => Ok(Algorithm::HS384),
            Self::HS512 => Ok(Algorithm::HS512),
            Self::RS256 => Ok(Algorithm::RS256),
            Self::RS384 => Ok(Algorithm::RS384),
            Self::RS512 => Ok(Algorithm::RS512),
            Self::ES256 => Ok(Algorithm::ES256),
            Self::ES384 => Ok(Algorithm::ES384),
            Self::None | Self::ES512 => {
                Err(SigningError::UnsupportedAlgorithm(self.as_str().to_string()))
            }
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "ES512" => Ok(Self::ES512),
            other => Err(SigningError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Private key material handed to a [`JwtSigner`]
#[derive(Clone, PartialEq, Eq)]
pub enum SigningKey {
    /// Shared secret for HMAC
    Secret(Vec<u8>),
    /// PEM encoded RSA private key
    Rsa { kid: String, pem: Vec<u8> },
    /// PEM encoded EC private key
    Ec { kid: String, pem: Vec<u8> },
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(_) => f.write_str("SigningKey::Secret(..)"),
            Self::Rsa { kid, .. } => write!(f, "SigningKey::Rsa({})", kid),
            Self::Ec { kid, .. } => write!(f, "SigningKey::Ec({})", kid),
        }
    }
}

impl SigningKey {
    /// Reads a PEM private key, detecting whether it is RSA or EC
    pub fn from_pem(kid: &str, pem: Vec<u8>) -> Result<Self, SigningError> {
        if EncodingKey::from_rsa_pem(&pem).is_ok() {
            return Ok(Self::Rsa {
                kid: kid.to_string(),
                pem,
            });
        }
        if EncodingKey::from_ec_pem(&pem).is_ok() {
            return Ok(Self::Ec {
                kid: kid.to_string(),
                pem,
            });
        }
        Err(SigningError::InvalidKey(format!(
            "key '{}' is neither an RSA nor an EC private key",
            kid
        )))
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::Secret(_) => AlgorithmFamily::Hmac,
            Self::Rsa { .. } => AlgorithmFamily::Rsa,
            Self::Ec { .. } => AlgorithmFamily::Ec,
        }
    }

    pub fn kid(&self) -> Option<&str> {
        match self {
            Self::Secret(_) => None,
            Self::Rsa { kid, .. } | Self::Ec { kid, .. } => Some(kid),
        }
    }

    fn encoding_key(&self) -> Result<EncodingKey, SigningError> {
        match self {
            Self::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
            Self::Rsa { pem, .. } => Ok(EncodingKey::from_rsa_pem(pem)?),
            Self::Ec { pem, .. } => Ok(EncodingKey::from_ec_pem(pem)?),
        }
    }
}

/// Produces the signature part of a compact JWS
pub trait JwtSigner: Send + Sync + fmt::Debug {
    /// Signs `signing_input` (`header.payload`) and returns the base64url signature
    fn sign(
        &self,
        signing_input: &[u8],
        key: &SigningKey,
        algorithm: SignatureAlgorithm,
    ) -> Result<String, SigningError>;
}

/// Signer backed by `jsonwebtoken`
#[derive(Debug, Clone, Default)]
pub struct DefaultJwtSigner;

impl JwtSigner for DefaultJwtSigner {
    fn sign(
        &self,
        signing_input: &[u8],
        key: &SigningKey,
        algorithm: SignatureAlgorithm,
    ) -> Result<String, SigningError> {
        let expected = algorithm.family();
        if expected == AlgorithmFamily::None {
            return Ok(String::new());
        }
        if key.family() != expected {
            return Err(SigningError::KeyMismatch {
                algorithm,
                expected,
            });
        }
        let jwt_algorithm = algorithm.to_jwt_algorithm()?;
        Ok(jsonwebtoken::crypto::sign(
            signing_input,
            &key.encoding_key()?,
            jwt_algorithm,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::DecodingKey;

    #[test]
    fn test_algorithm_names_and_families() {
        for name in [
            "none", "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "ES256", "ES384",
            "ES512",
        ] {
            let alg: SignatureAlgorithm = name.parse().unwrap();
            assert_eq!(alg.as_str(), name);
        }
        assert!("hs256".parse::<SignatureAlgorithm>().is_err());
        assert!(SignatureAlgorithm::ES384.is_signable());
        assert!(SignatureAlgorithm::None.is_signable());
        assert!(!SignatureAlgorithm::ES512.is_signable());
        assert_eq!(SignatureAlgorithm::RS384.family(), AlgorithmFamily::Rsa);
        assert_eq!(SignatureAlgorithm::ES256.family(), AlgorithmFamily::Ec);
        assert_eq!(SignatureAlgorithm::HS512.digest_bits(), 512);
    }

    #[test]
    fn test_hmac_signature_verifies() {
        let signer = DefaultJwtSigner;
        let key = SigningKey::Secret(b"client-secret".to_vec());
        let input = b"eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1c2VyIn0";

        let signature = signer
            .sign(input, &key, SignatureAlgorithm::HS256)
            .unwrap();
        let valid = jsonwebtoken::crypto::verify(
            &signature,
            input,
            &DecodingKey::from_secret(b"client-secret"),
            Algorithm::HS256,
        )
        .unwrap();
        assert!(valid);
    }

    #[test]
    fn test_family_mismatch_is_rejected() {
        let signer = DefaultJwtSigner;
        let key = SigningKey::Secret(b"secret".to_vec());
        let result = signer.sign(b"a.b", &key, SignatureAlgorithm::RS256);
        assert!(matches!(
            result,
            Err(SigningError::KeyMismatch {
                expected: AlgorithmFamily::Rsa,
                ..
            })
        ));
    }

    #[test]
    fn test_none_produces_empty_signature() {
        let signer = DefaultJwtSigner;
        let key = SigningKey::Secret(Vec::new());
        assert_eq!(
            signer.sign(b"a.b", &key, SignatureAlgorithm::None).unwrap(),
            ""
        );
    }

    #[test]
    fn test_invalid_pem_is_rejected() {
        let result = SigningKey::from_pem("k1", b"not a pem".to_vec());
        assert!(matches!(result, Err(SigningError::InvalidKey(_))));
    }
}
