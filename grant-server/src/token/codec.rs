//! Token code generation and one-way encoding for storage lookups

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

// Add base64url encoding support
mod base64_url {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    pub fn encode(input: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(input)
    }
}

/// Hashed form of a token code, as stored in the directory.
///
/// Lookups by code always hash first; the plain code never reaches storage.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    base64_url::encode(&hasher.finalize())
}

/// Generate a cryptographically secure random code (32 bytes, base64url)
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let code_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    base64_url::encode(&code_bytes)
}

/// Random alphanumeric suffix of `len` characters
pub fn generate_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Code of an UMA token (RPT, PCT): a UUID followed by `_` and eight random characters
pub fn generate_uma_code() -> String {
    format!("{}_{}", uuid::Uuid::new_v4(), generate_suffix(8))
}

/// Left half of the SHA-2 digest matching `bits`, base64url encoded.
///
/// Used for the `at_hash` and `c_hash` ID token claims.
pub fn left_half_hash(value: &str, bits: u16) -> String {
    let digest: Vec<u8> = match bits {
        384 => sha2::Sha384::digest(value.as_bytes()).to_vec(),
        512 => sha2::Sha512::digest(value.as_bytes()).to_vec(),
        _ => Sha256::digest(value.as_bytes()).to_vec(),
    };
    base64_url::encode(&digest[..digest.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_is_stable_and_hides_code() {
        let code = generate_code();
        assert_eq!(hash_code(&code), hash_code(&code));
        assert_ne!(hash_code(&code), code);
        assert_ne!(hash_code(&code), hash_code(&generate_code()));
        // 32 byte digest, base64url without padding
        assert_eq!(hash_code(&code).len(), 43);
    }

    #[test]
    fn test_generated_codes_are_unique() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_code()).collect();
        assert_eq!(codes.len(), 1000);
        let uma: HashSet<String> = (0..1000).map(|_| generate_uma_code()).collect();
        assert_eq!(uma.len(), 1000);
    }

    #[test]
    fn test_uma_code_shape() {
        let code = generate_uma_code();
        let (uuid, suffix) = code.split_once('_').unwrap();
        assert!(uuid::Uuid::parse_str(uuid).is_ok());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_left_half_hash_lengths() {
        // 16, 24 and 32 bytes before encoding
        assert_eq!(left_half_hash("token", 256).len(), 22);
        assert_eq!(left_half_hash("token", 384).len(), 32);
        assert_eq!(left_half_hash("token", 512).len(), 43);
    }
}
