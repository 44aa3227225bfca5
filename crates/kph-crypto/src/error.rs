//! Error type for envelope operations.

use thiserror::Error;

/// Errors from encrypting, decrypting, or decoding envelope material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Decoded key is not a valid AES key size.
    #[error("invalid key length: {0} bytes (expected 16, 24, or 32)")]
    InvalidKeyLength(usize),

    /// Decoded nonce is not exactly one AES block.
    #[error("invalid nonce length: {0} bytes (expected 16)")]
    InvalidNonceLength(usize),

    /// Key, nonce, or ciphertext is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Ciphertext is not a whole number of blocks or its padding is invalid.
    #[error("decryption failed: bad ciphertext length or padding")]
    Decryption,

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted data is not valid UTF-8")]
    NotUtf8,
}
