use thiserror::Error;

/// Errors produced by the crypto module.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
    /// A salt had the wrong length.
    #[error("invalid salt length: expected {expected}, got {actual}")]
    InvalidSaltLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
    /// A ciphertext was too short to contain nonce and MAC.
    #[error("ciphertext too short: need at least {minimum} bytes, got {actual}")]
    CiphertextTooShort {
        /// Minimum length in bytes.
        minimum: usize,
        /// Actual length in bytes.
        actual: usize,
    },
    /// Authenticated decryption failed.
    #[error("decryption failed")]
    DecryptionFailed,
    /// Encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,
    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivationFailed,
    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Hex decoding failed.
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
