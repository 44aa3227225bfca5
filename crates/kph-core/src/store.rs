//! In-memory association registry: the trust root for keyed requests.
//!
//! An association pairs an opaque id with a client's shared key, created
//! exactly once per successful `associate` and alive for the process
//! lifetime unless bulk-cleared by the test setup path. Ids are looked up,
//! never enumerated; keys never leave the store except inside the opaque
//! [`SharedKey`] handle.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use kph_crypto::SharedKey;

/// A registered id/key pairing.
#[derive(Debug, Clone)]
pub struct Association {
    /// The opaque id handed to the client at association time.
    pub id: String,
    /// The shared key all of this client's traffic is encrypted under.
    pub key: SharedKey,
}

/// Thread-safe registry of associations.
///
/// Clone shares the same underlying map (`Arc<Mutex<_>>`); `create` and
/// `clear` are the only mutators and serialize against each other and
/// against `lookup` through a single exclusive lock. All operations are
/// O(1), so lock granularity is not a concern for a test harness.
#[derive(Clone, Default)]
pub struct AssociationStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    associations: HashMap<String, SharedKey>,
    /// Monotonic suffix making generated ids unique even within one
    /// millisecond.
    sequence: u64,
}

impl AssociationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under a freshly generated unique id and return the id.
    ///
    /// Ids carry the `Mock-KPH-` prefix clients see on the wire, a
    /// timestamp, and a sequence number assigned under the lock so two
    /// concurrent creates can never collide.
    pub fn create(&self, key: SharedKey) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();

        let mut inner = self.inner.lock().expect("AssociationStore mutex poisoned");
        inner.sequence += 1;
        let id = format!("Mock-KPH-{millis}-{:04}", inner.sequence);
        inner.associations.insert(id.clone(), key);
        id
    }

    /// Look up an association by id.
    pub fn lookup(&self, id: &str) -> Option<Association> {
        let inner = self.inner.lock().expect("AssociationStore mutex poisoned");
        inner.associations.get(id).map(|key| Association { id: id.to_string(), key: key.clone() })
    }

    /// Remove all associations. Used by the setup path to reset trust
    /// between test scenarios.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("AssociationStore mutex poisoned");
        inner.associations.clear();
    }

    /// Number of live associations.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("AssociationStore mutex poisoned");
        inner.associations.len()
    }

    /// True if no associations are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> SharedKey {
        use base64::{Engine as _, engine::general_purpose::STANDARD};
        SharedKey::from_base64(&STANDARD.encode([fill; 32])).unwrap()
    }

    #[test]
    fn create_then_lookup() {
        let store = AssociationStore::new();
        let id = store.create(test_key(1));

        let association = store.lookup(&id).unwrap();
        assert_eq!(association.id, id);
        assert_eq!(association.key, test_key(1));
    }

    #[test]
    fn ids_are_unique() {
        let store = AssociationStore::new();
        let first = store.create(test_key(1));
        let second = store.create(test_key(2));

        assert_ne!(first, second);
        assert!(first.starts_with("Mock-KPH-"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn lookup_unknown_is_none() {
        let store = AssociationStore::new();
        assert!(store.lookup("Mock-KPH-never-issued").is_none());
    }

    #[test]
    fn clear_removes_everything() {
        let store = AssociationStore::new();
        let id = store.create(test_key(1));
        store.create(test_key(2));

        store.clear();

        assert!(store.is_empty());
        assert!(store.lookup(&id).is_none());
    }

    #[test]
    fn clones_share_state() {
        let store = AssociationStore::new();
        let other = store.clone();

        let id = store.create(test_key(1));
        assert!(other.lookup(&id).is_some());
    }

    #[test]
    fn concurrent_creates_stay_unique() {
        let store = AssociationStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50).map(|_| store.create(test_key(i))).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<String> =
            handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), total);
        assert_eq!(store.len(), total);
    }
}
