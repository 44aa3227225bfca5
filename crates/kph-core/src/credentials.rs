//! Seeded plaintext credentials, indexed by URL host.
//!
//! The engine consumes credentials through [`CredentialLookup`]; the
//! in-memory implementation here is what the test setup path seeds and
//! clears. Records are stored and matched by the host component of a URL
//! (including a port if one is given), so `https://example.com/login`
//! matches credentials seeded for `https://example.com/`.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

/// One plaintext login record, as seeded by a test operator.
///
/// Field names match the setup-path JSON (lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Display name of the entry.
    pub name: String,
    /// Stable identifier of the entry.
    pub uuid: String,
}

/// Read side of the credential collaborator, as seen by the engine.
///
/// `find` may block (a real backend could hit disk or network), so callers
/// dispatching from an async context should isolate it accordingly.
pub trait CredentialLookup: Send + Sync {
    /// All records seeded for the host of `url`, or `None` if the URL has no
    /// recognizable host or nothing was seeded for it.
    fn find(&self, url: &str) -> Option<Vec<LoginRecord>>;
}

/// In-memory credential map keyed by URL host.
///
/// Clone shares the same underlying map, so the setup path and the engine
/// can hold the same store.
#[derive(Clone, Default)]
pub struct MemoryCredentials {
    inner: Arc<Mutex<HashMap<String, Vec<LoginRecord>>>>,
}

impl MemoryCredentials {
    /// Create an empty credential store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records under the host of `url`, replacing whatever was seeded
    /// for that host before. URLs without a recognizable host are ignored.
    pub fn set(&self, url: &str, records: Vec<LoginRecord>) {
        if let Some(host) = host_of(url) {
            let mut inner = self.inner.lock().expect("MemoryCredentials mutex poisoned");
            inner.insert(host, records);
        }
    }

    /// Remove all seeded credentials.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("MemoryCredentials mutex poisoned");
        inner.clear();
    }
}

impl CredentialLookup for MemoryCredentials {
    fn find(&self, url: &str) -> Option<Vec<LoginRecord>> {
        let host = host_of(url)?;
        let inner = self.inner.lock().expect("MemoryCredentials mutex poisoned");
        inner.get(&host).cloned()
    }
}

/// Extract the host (with port, if any) from a URL.
///
/// Matches what the protocol needs from a WHATWG `URL.host`: the authority
/// after any userinfo, lowercased, up to the first path/query/fragment
/// delimiter. Returns `None` when there is no scheme or no host.
fn host_of(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if host.is_empty() { None } else { Some(host.to_ascii_lowercase()) }
}
