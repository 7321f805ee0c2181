//! Cryptographic building blocks for the client core.
//!
//! Pure Rust implementation throughout; nothing here talks to the network.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL},
};
use sha2::{Digest, Sha256};

mod error;
pub mod kdf;
pub mod keys;

pub use error::{CryptoError, Result};

/// Decode a base64 string to bytes.
pub fn decode_b64(input: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(input)?)
}

/// Encode bytes to a standard base64 string (RFC 4648 §4).
pub fn encode_b64(input: &[u8]) -> String {
    BASE64.encode(input)
}

/// Encode bytes to an unpadded URL-safe base64 string (RFC 4648 §5).
///
/// The output alphabet is `[A-Za-z0-9_-]` only, so the value can be embedded
/// in URLs without escaping.
pub fn encode_b64_url(input: &[u8]) -> String {
    BASE64_URL.encode(input)
}

/// Decode a hex string to bytes.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(input)?)
}

/// Encode bytes to a hex string (lowercase).
pub fn encode_hex(input: &[u8]) -> String {
    hex::encode(input)
}

/// Convert a base64 string to hex.
pub fn b64_to_hex(b64: &str) -> Result<String> {
    let bytes = decode_b64(b64)?;
    Ok(encode_hex(&bytes))
}

/// Compute the authentication verifier for a derived key.
///
/// The verifier is the SHA-256 digest of the raw derived key bytes, encoded
/// as unpadded URL-safe base64. It is sent to the server in place of the
/// password; the server can check it without ever seeing the key itself.
/// Because it travels as a URL parameter it must not contain `+`, `/` or `=`.
pub fn auth_verifier(derived_key_hex: &str) -> Result<String> {
    let key = decode_hex(derived_key_hex)?;
    let digest = Sha256::digest(&key);
    Ok(encode_b64_url(&digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let original = b"Hello, World!";
        let encoded = encode_b64(original);
        let decoded = decode_b64(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = b"Hello, World!";
        let encoded = encode_hex(original);
        let decoded = decode_hex(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_b64_to_hex() {
        let b64 = encode_b64(b"Test");
        assert_eq!(b64_to_hex(&b64).unwrap(), "54657374");
    }

    #[test]
    fn test_invalid_base64() {
        assert!(decode_b64("not valid base64!!!").is_err());
    }

    #[test]
    fn test_invalid_hex() {
        assert!(decode_hex("not valid hex!!!").is_err());
    }

    #[test]
    fn test_auth_verifier_is_url_safe() {
        // Exercise many key values; the verifier must never need URL escaping.
        for i in 0..64u8 {
            let key = vec![i; 32];
            let verifier = auth_verifier(&encode_hex(&key)).unwrap();
            assert!(
                verifier
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                "verifier contains characters requiring URL escaping: {verifier}"
            );
            assert!(!verifier.contains('='));
        }
    }

    #[test]
    fn test_auth_verifier_deterministic() {
        let hex_key = encode_hex(&[7u8; 32]);
        assert_eq!(
            auth_verifier(&hex_key).unwrap(),
            auth_verifier(&hex_key).unwrap()
        );
    }

    #[test]
    fn test_auth_verifier_rejects_bad_hex() {
        assert!(auth_verifier("zz").is_err());
    }
}
