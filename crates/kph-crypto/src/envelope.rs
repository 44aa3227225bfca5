//! AES-CBC envelope keyed by a per-association shared secret.
//!
//! All public functions take base64 text and return base64 text; raw bytes
//! never cross the crate boundary. Each call is independent given its key.

use std::fmt;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Nonce length in bytes. One AES block: the nonce is also the CBC IV.
pub const NONCE_SIZE: usize = 16;

/// AES key material, one variant per accepted key size.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
enum AesKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// A client's shared secret, decoded from the base64 key it registered.
///
/// Immutable once created and zeroed on drop. The raw bytes are not exposed;
/// callers hand the key to a [`CryptoEnvelope`] and use that.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey(AesKey);

impl SharedKey {
    /// Decode a base64 key supplied by a client at association time.
    ///
    /// Accepts 128-, 192-, and 256-bit keys, matching the key sizes the AES
    /// block cipher defines. KeePassHttp clients in practice send 256-bit
    /// keys.
    pub fn from_base64(key: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(key)?;
        let aes_key = match bytes.len() {
            16 => AesKey::Aes128(into_array(&bytes)),
            24 => AesKey::Aes192(into_array(&bytes)),
            32 => AesKey::Aes256(into_array(&bytes)),
            other => return Err(CryptoError::InvalidKeyLength(other)),
        };
        Ok(Self(aes_key))
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        f.write_str("SharedKey(..)")
    }
}

/// Copy a validated-length slice into a fixed array.
fn into_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Stateless AES-CBC encrypt/decrypt/verify primitive for one shared key.
///
/// No authentication tag is produced or checked: the KeePassHttp wire format
/// is plain CBC and this implementation preserves that for compatibility.
#[derive(Clone)]
pub struct CryptoEnvelope {
    key: SharedKey,
}

impl CryptoEnvelope {
    /// Build an envelope around an already-decoded shared key.
    pub fn new(key: SharedKey) -> Self {
        Self { key }
    }

    /// Build an envelope directly from a client-supplied base64 key.
    pub fn from_base64_key(key: &str) -> Result<Self, CryptoError> {
        Ok(Self::new(SharedKey::from_base64(key)?))
    }

    /// Encrypt UTF-8 `plaintext` under this key, using the base64 `nonce` as
    /// IV. Returns base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str, nonce: &str) -> Result<String, CryptoError> {
        let iv = decode_nonce(nonce)?;
        let ciphertext = match &self.key.0 {
            AesKey::Aes128(key) => cbc::Encryptor::<aes::Aes128>::new(key.into(), (&iv).into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
            AesKey::Aes192(key) => cbc::Encryptor::<aes::Aes192>::new(key.into(), (&iv).into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
            AesKey::Aes256(key) => cbc::Encryptor::<aes::Aes256>::new(key.into(), (&iv).into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
        };
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt base64 `ciphertext` under this key, using the base64 `nonce`
    /// as IV. Returns the UTF-8 plaintext.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Decryption`] if the ciphertext is not a whole number
    ///   of blocks or the PKCS#7 padding does not check out
    /// - [`CryptoError::NotUtf8`] if the decrypted bytes are not valid UTF-8
    pub fn decrypt(&self, ciphertext: &str, nonce: &str) -> Result<String, CryptoError> {
        let iv = decode_nonce(nonce)?;
        let data = STANDARD.decode(ciphertext)?;
        let plaintext = match &self.key.0 {
            AesKey::Aes128(key) => cbc::Decryptor::<aes::Aes128>::new(key.into(), (&iv).into())
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
            AesKey::Aes192(key) => cbc::Decryptor::<aes::Aes192>::new(key.into(), (&iv).into())
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
            AesKey::Aes256(key) => cbc::Decryptor::<aes::Aes256>::new(key.into(), (&iv).into())
                .decrypt_padded_vec_mut::<Pkcs7>(&data),
        }
        .map_err(|_| CryptoError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::NotUtf8)
    }

    /// Check a verifier: decrypt it with `nonce` as IV and compare the
    /// plaintext against the nonce's own base64 text, byte for byte.
    ///
    /// This is the protocol's sole authentication check. A verifier that
    /// cannot be decrypted at all simply fails verification; the caller does
    /// not learn why.
    pub fn verify(&self, verifier: &str, nonce: &str) -> bool {
        self.decrypt(verifier, nonce).is_ok_and(|plaintext| plaintext == nonce)
    }

    /// Produce a verifier proving this side also holds the key:
    /// `encrypt(nonce, nonce)`.
    pub fn generate_verifier(&self, nonce: &str) -> Result<String, CryptoError> {
        self.encrypt(nonce, nonce)
    }
}

/// Generate a fresh 16-byte random nonce, base64 encoded.
///
/// Drawn from the operating system CSPRNG. The protocol itself only requires
/// uniform random bytes; nonce unpredictability is not a property any test
/// asserts.
pub fn generate_nonce() -> String {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    STANDARD.encode(nonce)
}

/// Decode a base64 nonce and check it is exactly one AES block.
fn decode_nonce(nonce: &str) -> Result<[u8; NONCE_SIZE], CryptoError> {
    let bytes = STANDARD.decode(nonce)?;
    if bytes.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonceLength(bytes.len()));
    }
    Ok(into_array(&bytes))
}
