//! Symmetric keys and key wrapping.
//!
//! Key wrap uses XSalsa20-Poly1305 with the libsodium secretbox wire format:
//!
//! Blob: nonce (24 bytes) || MAC (16 bytes) || ciphertext (32 bytes)
//!
//! Note: RustCrypto's AEAD outputs ciphertext || MAC, so we must reorder
//! bytes to stay wire compatible.

use std::fmt;

use rand_core::{OsRng, RngCore};
use xsalsa20poly1305::XSalsa20Poly1305;
use xsalsa20poly1305::aead::generic_array::GenericArray;
use xsalsa20poly1305::aead::{Aead, KeyInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CryptoError, Result};

/// Size of a symmetric key in bytes.
pub const KEY_BYTES: usize = 32;

/// Size of a key-wrap nonce in bytes.
pub const NONCE_BYTES: usize = 24;

/// Size of the authentication tag in bytes.
pub const MAC_BYTES: usize = 16;

/// A 256-bit symmetric key, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_BYTES]);

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_BYTES] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_BYTES,
                    actual: bytes.len(),
                })?;
        Ok(SymmetricKey(array))
    }

    /// Create a key from a hex string.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = super::decode_hex(hex_key)?;
        Self::from_bytes(&bytes)
    }

    /// Encode the key as a hex string.
    pub fn to_hex(&self) -> String {
        super::encode_hex(&self.0)
    }

    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        SymmetricKey(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    // Key material stays out of logs and panic messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Wrap `key` under `wrapping`.
///
/// # Returns
/// The blob nonce || MAC || ciphertext.
pub fn encrypt_key(wrapping: &SymmetricKey, key: &SymmetricKey) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(wrapping.as_bytes()));

    // RustCrypto returns: ciphertext || MAC
    let rust_output = cipher
        .encrypt(GenericArray::from_slice(&nonce), key.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let ct_len = rust_output.len() - MAC_BYTES;
    let mut blob = Vec::with_capacity(NONCE_BYTES + rust_output.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&rust_output[ct_len..]); // MAC first
    blob.extend_from_slice(&rust_output[..ct_len]); // then ciphertext

    Ok(blob)
}

/// Unwrap a key blob (nonce || MAC || ciphertext) with `wrapping`.
///
/// Fails with [`CryptoError::DecryptionFailed`] when the wrapping key does
/// not match or the blob was tampered with.
pub fn decrypt_key(wrapping: &SymmetricKey, blob: &[u8]) -> Result<SymmetricKey> {
    if blob.len() < NONCE_BYTES + MAC_BYTES {
        return Err(CryptoError::CiphertextTooShort {
            minimum: NONCE_BYTES + MAC_BYTES,
            actual: blob.len(),
        });
    }

    let nonce = &blob[..NONCE_BYTES];
    let mac = &blob[NONCE_BYTES..NONCE_BYTES + MAC_BYTES];
    let ct = &blob[NONCE_BYTES + MAC_BYTES..];

    // RustCrypto expects: ciphertext || MAC
    let mut rust_input = Vec::with_capacity(mac.len() + ct.len());
    rust_input.extend_from_slice(ct);
    rust_input.extend_from_slice(mac);

    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(wrapping.as_bytes()));
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), rust_input.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    SymmetricKey::from_bytes(&plaintext)
}
