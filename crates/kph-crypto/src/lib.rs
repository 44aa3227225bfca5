//! KeePassHttp Cryptographic Primitives
//!
//! The envelope every KeePassHttp message travels in: AES in CBC mode with
//! PKCS#7 padding, keys and nonces and ciphertexts all base64 on the wire.
//! The same 16-byte nonce doubles as the CBC initialization vector and as the
//! challenge value of the verifier scheme.
//!
//! # Verifier scheme
//!
//! Possession of a shared key is proven by encrypting a nonce's own base64
//! text under that key, using the nonce as IV:
//!
//! ```text
//! verifier = encrypt(base64(nonce), key, iv = nonce)
//! ```
//!
//! The receiver decrypts the verifier and compares the plaintext against the
//! base64 text of the nonce it arrived with. Every request carries a fresh
//! nonce/verifier pair; nothing is ever reused across requests.
//!
//! # Security
//!
//! CBC mode carries no authentication tag, so the envelope provides
//! confidentiality but no integrity. That is a property of the KeePassHttp
//! wire format itself and is preserved here for compatibility with the
//! protocol's client ecosystem. Do not reuse this envelope outside the
//! protocol it implements.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;

pub use envelope::{CryptoEnvelope, NONCE_SIZE, SharedKey, generate_nonce};
pub use error::CryptoError;
