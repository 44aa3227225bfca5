//! KeePassHttp Mock Protocol Core
//!
//! Sessionless challenge/response protocol engine behind a mock KeePassHttp
//! endpoint. A browser extension registers a shared AES key once
//! (`associate`), then proves possession of that key on every later request
//! with a fresh nonce/verifier pair; there is no server-side session state
//! beyond the association itself.
//!
//! # Components
//!
//! - [`RequestEnvelope`] / [`ResponseEnvelope`]: the JSON wire records
//! - [`AssociationStore`]: id → shared key registry, the trust root
//! - [`CredentialLookup`] / [`MemoryCredentials`]: seeded plaintext logins,
//!   indexed by URL host
//! - [`ProtocolEngine`]: dispatches a decoded request to its handler and
//!   converts every protocol failure into a `Success: false` response
//!
//! Transport concerns (reading bodies, JSON decode, HTTP status codes) live
//! in `kph-server`; this crate never sees an unparsed byte.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod credentials;
mod engine;
mod error;
mod store;
mod wire;

pub use credentials::{CredentialLookup, LoginRecord, MemoryCredentials};
pub use engine::ProtocolEngine;
pub use error::ProtocolError;
pub use store::{Association, AssociationStore};
pub use wire::{Entry, RequestEnvelope, RequestKind, ResponseEnvelope, VERSION};
