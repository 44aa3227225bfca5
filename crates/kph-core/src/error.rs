//! Error taxonomy for protocol dispatch.
//!
//! A closed set of failure kinds so callers (and tests) can branch on kind
//! rather than message text. Every variant raised during dispatch is caught
//! at the engine boundary and converted into a `Success: false` response;
//! none of them surface as transport-level failures.

use kph_crypto::CryptoError;
use thiserror::Error;

/// Protocol-level failures raised while handling a decoded request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `RequestType` is not one this mock handles. Covers both unknown
    /// strings and vocabulary kinds with no handler (`get-logins-count`,
    /// `set-login`).
    #[error("unsupported RequestType \"{0}\"")]
    UnsupportedRequestType(String),

    /// `Id` does not match any stored association.
    #[error("unknown Id \"{0}\"")]
    UnknownAssociation(String),

    /// The decrypted verifier does not equal the request's nonce.
    #[error("invalid verifier")]
    InvalidVerifier,

    /// A field the request kind requires was absent.
    #[error("no {0} supplied")]
    MissingField(&'static str),

    /// The `Key` offered at association time could not be decoded.
    #[error("invalid association key: {0}")]
    InvalidKey(#[source] CryptoError),

    /// An encrypted payload could not be processed under the resolved key.
    #[error("decryption failed: {0}")]
    Decryption(#[from] CryptoError),
}
