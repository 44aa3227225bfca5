//! JSON wire records exchanged with KeePassHttp clients.
//!
//! Field names are part of the protocol and are PascalCase on the wire.
//! Responses always carry the full fixed field set with neutral defaults
//! (`null` / `""` / `false`) rather than omitting unused fields; clients
//! expect a fixed shape.

use serde::{Deserialize, Serialize};

/// Version string reported in every response.
pub const VERSION: &str = "Mock-KeePassHttp";

/// The request kinds in the KeePassHttp vocabulary.
///
/// All five are recognized on the wire; only the first three have handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Check that a previously registered id still verifies.
    TestAssociate,
    /// Register a new shared key and receive an id for it.
    Associate,
    /// Fetch encrypted credentials for a URL.
    GetLogins,
    /// Count credentials for a URL (vocabulary only, unhandled).
    GetLoginsCount,
    /// Store a credential (vocabulary only, unhandled).
    SetLogin,
}

impl RequestKind {
    /// Parse a wire `RequestType` string. `None` for anything outside the
    /// vocabulary.
    pub fn parse(request_type: &str) -> Option<Self> {
        match request_type {
            "test-associate" => Some(Self::TestAssociate),
            "associate" => Some(Self::Associate),
            "get-logins" => Some(Self::GetLogins),
            "get-logins-count" => Some(Self::GetLoginsCount),
            "set-login" => Some(Self::SetLogin),
            _ => None,
        }
    }
}

/// A decoded protocol request.
///
/// Every field except `RequestType` is optional at the decode stage; which
/// ones a given kind requires is checked by the engine, so that a missing
/// field becomes a structured protocol failure rather than a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Discriminator, e.g. `"associate"`.
    #[serde(rename = "RequestType")]
    pub request_type: String,

    /// Association id, absent on `associate`.
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// 16-byte random IV/challenge, base64.
    #[serde(rename = "Nonce", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// `encrypt(base64(nonce), key, iv = nonce)`, base64.
    #[serde(rename = "Verifier", default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,

    /// New base64 shared key (`associate` only).
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Encrypted URL to look up (`get-logins` only).
    #[serde(rename = "Url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Encrypted submit URL. Carried for wire compatibility, unused.
    #[serde(rename = "SubmitUrl", default, skip_serializing_if = "Option::is_none")]
    pub submit_url: Option<String>,
}

/// One credential entry in a `get-logins` response. All string fields are
/// ciphertext under the response nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Encrypted username.
    #[serde(rename = "Login")]
    pub login: String,

    /// Encrypted item name.
    #[serde(rename = "Name")]
    pub name: String,

    /// Encrypted password.
    #[serde(rename = "Password")]
    pub password: String,

    /// Extra fields. Intentionally unimplemented, always `null`.
    #[serde(rename = "StringFields")]
    pub string_fields: Option<String>,

    /// Encrypted entry UUID.
    #[serde(rename = "Uuid")]
    pub uuid: String,
}

/// A protocol response with the complete fixed field set.
///
/// Built through [`ResponseEnvelope::for_request`], which fills every field
/// with its neutral default; handlers then overwrite only the fields their
/// outcome produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Number of matched logins, `null` unless `get-logins` succeeded.
    #[serde(rename = "Count")]
    pub count: Option<usize>,

    /// Matched logins (ciphertext fields), `null` unless `get-logins`
    /// succeeded.
    #[serde(rename = "Entries")]
    pub entries: Option<Vec<Entry>>,

    /// Human-readable failure message, `""` on success.
    #[serde(rename = "Error")]
    pub error: String,

    /// Database hash. Not modeled by the mock, always `""`.
    #[serde(rename = "Hash")]
    pub hash: String,

    /// Association id this response is tied to.
    #[serde(rename = "Id")]
    pub id: String,

    /// Fresh response nonce, base64.
    #[serde(rename = "Nonce")]
    pub nonce: String,

    /// Echo of the request's `RequestType`.
    #[serde(rename = "RequestType")]
    pub request_type: String,

    /// Whether the request was handled successfully.
    #[serde(rename = "Success")]
    pub success: bool,

    /// Server-side proof of key possession under the response nonce.
    #[serde(rename = "Verifier")]
    pub verifier: String,

    /// Identifying string of this mock implementation.
    #[serde(rename = "Version")]
    pub version: String,
}

impl ResponseEnvelope {
    /// A response with every field at its neutral default, echoing the
    /// request kind.
    pub fn for_request(request_type: &str) -> Self {
        Self {
            count: None,
            entries: None,
            error: String::new(),
            hash: String::new(),
            id: String::new(),
            nonce: String::new(),
            request_type: request_type.to_string(),
            success: false,
            verifier: String::new(),
            version: VERSION.to_string(),
        }
    }
}
