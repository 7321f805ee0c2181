//! Passphrase key derivation.
//!
//! Argon2id with fixed interactive parameters. Derivation is deterministic:
//! the same passphrase and salt always produce the same key, which is what
//! lets the client re-derive the login key on every session.

use argon2::{Algorithm, Argon2, Params, Version};

use super::{CryptoError, Result};

/// Salt length required for key derivation.
pub const SALT_BYTES: usize = 16;

/// Length of the derived key.
pub const KEY_BYTES: usize = 32;

// Interactive work parameters: 64 MiB, 2 passes, 1 lane.
const MEM_COST_KIB: u32 = 64 * 1024;
const PASS_COUNT: u32 = 2;
const LANES: u32 = 1;

/// Fixed, non-secret salt for the timing-equalization step of login.
///
/// When the server does not know the account, login still runs one full
/// derivation against this salt before reporting the lookup failure, so an
/// unknown address costs the same wall-clock time as a wrong password.
pub const PLACEHOLDER_SALT: [u8; SALT_BYTES] = *b"0123456789abcdef";

/// Derive a symmetric key from a passphrase and salt.
///
/// # Arguments
/// * `passphrase` - The user's passphrase.
/// * `salt` - 16-byte salt.
///
/// # Returns
/// The 32-byte derived key, hex encoded.
pub fn derive_passphrase_key(passphrase: &str, salt: &[u8]) -> Result<String> {
    if salt.len() != SALT_BYTES {
        return Err(CryptoError::InvalidSaltLength {
            expected: SALT_BYTES,
            actual: salt.len(),
        });
    }

    let params = Params::new(MEM_COST_KIB, PASS_COUNT, LANES, Some(KEY_BYTES))
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_BYTES];
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

    Ok(super::encode_hex(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_deterministic() {
        let salt = [3u8; SALT_BYTES];
        let key1 = derive_passphrase_key("passphrase", &salt).unwrap();
        let key2 = derive_passphrase_key("passphrase", &salt).unwrap();
        assert_eq!(key1, key2);
        assert_eq!(key1.len(), KEY_BYTES * 2); // hex encoded
    }

    #[test]
    fn test_derive_differs_by_passphrase() {
        let salt = [3u8; SALT_BYTES];
        let key1 = derive_passphrase_key("passphrase", &salt).unwrap();
        let key2 = derive_passphrase_key("different", &salt).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_differs_by_salt() {
        let key1 = derive_passphrase_key("passphrase", &[1u8; SALT_BYTES]).unwrap();
        let key2 = derive_passphrase_key("passphrase", &[2u8; SALT_BYTES]).unwrap();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_invalid_salt_length() {
        let result = derive_passphrase_key("passphrase", &[0u8; 8]);
        assert!(matches!(result, Err(CryptoError::InvalidSaltLength { .. })));
    }

    #[test]
    fn test_placeholder_salt_derivation_succeeds() {
        // The timing-equalization path must never be able to fail cheaply.
        let key = derive_passphrase_key("anything", &PLACEHOLDER_SALT).unwrap();
        assert_eq!(key.len(), KEY_BYTES * 2);
    }
}
