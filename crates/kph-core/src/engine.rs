//! Protocol dispatch: one handler per supported request kind.
//!
//! The protocol keeps no per-request server state. Each request carries a
//! fresh nonce and a verifier encrypting that nonce under the sender's key;
//! each handler independently re-proves possession of the key before doing
//! anything else. `associate` registers a new key, `test-associate` is a
//! liveness probe for an existing one, `get-logins` returns encrypted
//! credentials for a decrypted URL. Everything else in the vocabulary is
//! rejected as unsupported.

use kph_crypto::{CryptoEnvelope, SharedKey, generate_nonce};
use tracing::{info, warn};

use crate::{
    credentials::CredentialLookup,
    error::ProtocolError,
    store::{Association, AssociationStore},
    wire::{Entry, RequestEnvelope, RequestKind, ResponseEnvelope},
};

/// Dispatches decoded requests against an association store and a credential
/// collaborator, producing complete response envelopes.
pub struct ProtocolEngine<C> {
    store: AssociationStore,
    credentials: C,
}

impl<C: CredentialLookup> ProtocolEngine<C> {
    /// Build an engine over an (externally owned, clone-shared) store and
    /// credential lookup.
    pub fn new(store: AssociationStore, credentials: C) -> Self {
        Self { store, credentials }
    }

    /// Handle one request, converting any protocol failure into a
    /// `Success: false` response that echoes the request's `Id` and
    /// `RequestType`.
    ///
    /// This is the engine boundary of the error design: nothing below it
    /// escapes as anything but a well-formed response envelope.
    pub fn dispatch(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        match self.handle(request) {
            Ok(response) => response,
            Err(error) => {
                warn!(request_type = %request.request_type, %error, "request failed");
                let mut response = ResponseEnvelope::for_request(&request.request_type);
                response.id = request.id.clone().unwrap_or_default();
                response.error = error.to_string();
                response
            },
        }
    }

    fn handle(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, ProtocolError> {
        match RequestKind::parse(&request.request_type) {
            Some(RequestKind::Associate) => self.associate(request),
            Some(RequestKind::TestAssociate) => self.test_associate(request),
            Some(RequestKind::GetLogins) => self.get_logins(request),
            Some(RequestKind::GetLoginsCount | RequestKind::SetLogin) | None => {
                Err(ProtocolError::UnsupportedRequestType(request.request_type.clone()))
            },
        }
    }

    /// `associate`: register the key the client offers, after the client
    /// proves it holds that key by encrypting the request nonce under it.
    ///
    /// The response carries a fresh nonce/verifier pair (a new round of
    /// mutual proof, not an echo of the client's). A failed associate leaves
    /// no trace in the store.
    fn associate(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, ProtocolError> {
        let offered_key = require(request.key.as_deref(), "Key")?;
        let nonce = require(request.nonce.as_deref(), "Nonce")?;
        let verifier = require(request.verifier.as_deref(), "Verifier")?;

        let key = SharedKey::from_base64(offered_key).map_err(ProtocolError::InvalidKey)?;
        let envelope = CryptoEnvelope::new(key.clone());
        if !envelope.verify(verifier, nonce) {
            return Err(ProtocolError::InvalidVerifier);
        }

        let id = self.store.create(key);
        info!(%id, "associated");

        self.proof_response(request, &id, &envelope)
    }

    /// `test-associate`: re-verify an existing association. Idempotent, no
    /// payload beyond the fresh proof pair.
    fn test_associate(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, ProtocolError> {
        let (association, envelope) = self.verify_keyed_request(request)?;
        self.proof_response(request, &association.id, &envelope)
    }

    /// `get-logins`: verify, decrypt the requested URL with the request's
    /// nonce, and return every matching seeded login with its fields
    /// encrypted under one fresh response nonce.
    ///
    /// An empty match set is a success with `Count: 0`; absence of
    /// credentials is not an error.
    fn get_logins(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, ProtocolError> {
        let (association, envelope) = self.verify_keyed_request(request)?;

        let encrypted_url = require(request.url.as_deref(), "Url")?;
        let request_nonce = require(request.nonce.as_deref(), "Nonce")?;
        let url = envelope.decrypt(encrypted_url, request_nonce)?;

        let logins = self.credentials.find(&url).unwrap_or_default();
        info!(id = %association.id, count = logins.len(), "get-logins");

        let nonce = generate_nonce();
        let entries = logins
            .iter()
            .map(|login| {
                Ok(Entry {
                    name: envelope.encrypt(&login.name, &nonce)?,
                    login: envelope.encrypt(&login.username, &nonce)?,
                    password: envelope.encrypt(&login.password, &nonce)?,
                    string_fields: None,
                    uuid: envelope.encrypt(&login.uuid, &nonce)?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        let mut response = ResponseEnvelope::for_request(&request.request_type);
        response.id = association.id;
        response.verifier = envelope.generate_verifier(&nonce)?;
        response.nonce = nonce;
        response.success = true;
        response.count = Some(entries.len());
        response.entries = Some(entries);
        Ok(response)
    }

    /// Common verification for requests keyed by an existing association:
    /// resolve `Id`, rebuild the envelope from the stored key, check the
    /// verifier against the nonce carried in this same request.
    fn verify_keyed_request(
        &self,
        request: &RequestEnvelope,
    ) -> Result<(Association, CryptoEnvelope), ProtocolError> {
        let id = require(request.id.as_deref(), "Id")?;
        let nonce = require(request.nonce.as_deref(), "Nonce")?;
        let verifier = require(request.verifier.as_deref(), "Verifier")?;

        let association = self
            .store
            .lookup(id)
            .ok_or_else(|| ProtocolError::UnknownAssociation(id.to_string()))?;

        let envelope = CryptoEnvelope::new(association.key.clone());
        if !envelope.verify(verifier, nonce) {
            return Err(ProtocolError::InvalidVerifier);
        }
        Ok((association, envelope))
    }

    /// Successful response carrying only a fresh nonce/verifier proof pair.
    fn proof_response(
        &self,
        request: &RequestEnvelope,
        id: &str,
        envelope: &CryptoEnvelope,
    ) -> Result<ResponseEnvelope, ProtocolError> {
        let nonce = generate_nonce();
        let mut response = ResponseEnvelope::for_request(&request.request_type);
        response.id = id.to_string();
        response.verifier = envelope.generate_verifier(&nonce)?;
        response.nonce = nonce;
        response.success = true;
        Ok(response)
    }
}

/// Resolve a field the request kind requires, or fail with the field's wire
/// name.
fn require<'a>(field: Option<&'a str>, name: &'static str) -> Result<&'a str, ProtocolError> {
    field.ok_or(ProtocolError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use kph_crypto::CryptoEnvelope;

    use super::*;
    use crate::credentials::{LoginRecord, MemoryCredentials};

    /// Client side of the handshake, for driving the engine in tests.
    struct Client {
        key: String,
        envelope: CryptoEnvelope,
    }

    impl Client {
        fn new() -> Self {
            let key = STANDARD.encode([0x11u8; 32]);
            let envelope = CryptoEnvelope::from_base64_key(&key).unwrap();
            Self { key, envelope }
        }

        fn proof(&self) -> (String, String) {
            let nonce = generate_nonce();
            let verifier = self.envelope.generate_verifier(&nonce).unwrap();
            (nonce, verifier)
        }

        fn associate_request(&self) -> RequestEnvelope {
            let (nonce, verifier) = self.proof();
            RequestEnvelope {
                request_type: "associate".into(),
                id: None,
                nonce: Some(nonce),
                verifier: Some(verifier),
                key: Some(self.key.clone()),
                url: None,
                submit_url: None,
            }
        }

        fn test_associate_request(&self, id: &str) -> RequestEnvelope {
            let (nonce, verifier) = self.proof();
            RequestEnvelope {
                request_type: "test-associate".into(),
                id: Some(id.to_string()),
                nonce: Some(nonce),
                verifier: Some(verifier),
                key: None,
                url: None,
                submit_url: None,
            }
        }

        fn get_logins_request(&self, id: &str, url: &str) -> RequestEnvelope {
            let (nonce, verifier) = self.proof();
            let encrypted_url = self.envelope.encrypt(url, &nonce).unwrap();
            RequestEnvelope {
                request_type: "get-logins".into(),
                id: Some(id.to_string()),
                nonce: Some(nonce),
                verifier: Some(verifier),
                key: None,
                url: Some(encrypted_url),
                submit_url: None,
            }
        }
    }

    fn engine() -> (ProtocolEngine<MemoryCredentials>, AssociationStore, MemoryCredentials) {
        let store = AssociationStore::new();
        let credentials = MemoryCredentials::new();
        let engine = ProtocolEngine::new(store.clone(), credentials.clone());
        (engine, store, credentials)
    }

    fn associate(engine: &ProtocolEngine<MemoryCredentials>, client: &Client) -> String {
        let response = engine.dispatch(&client.associate_request());
        assert!(response.success, "associate failed: {}", response.error);
        response.id
    }

    #[test]
    fn associate_returns_verifiable_proof() {
        let (engine, store, _) = engine();
        let client = Client::new();

        let response = engine.dispatch(&client.associate_request());

        assert!(response.success);
        assert!(response.id.starts_with("Mock-KPH-"));
        assert!(client.envelope.verify(&response.verifier, &response.nonce));
        assert!(store.lookup(&response.id).is_some());
        assert_eq!(response.version, "Mock-KeePassHttp");
    }

    #[test]
    fn associate_response_nonce_is_fresh() {
        let (engine, _, _) = engine();
        let client = Client::new();

        let request = client.associate_request();
        let response = engine.dispatch(&request);

        assert_ne!(Some(&response.nonce), request.nonce.as_ref());
    }

    #[test]
    fn associate_with_bad_verifier_rejected_and_store_untouched() {
        let (engine, store, _) = engine();
        let client = Client::new();

        let mut request = client.associate_request();
        request.verifier = Some(STANDARD.encode([0u8; 16]));

        let error = engine.handle(&request).unwrap_err();
        assert_eq!(error, ProtocolError::InvalidVerifier);
        assert!(store.is_empty());
    }

    #[test]
    fn associate_with_undecodable_key_rejected() {
        let (engine, store, _) = engine();
        let client = Client::new();

        let mut request = client.associate_request();
        request.key = Some("***".into());

        assert!(matches!(engine.handle(&request), Err(ProtocolError::InvalidKey(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_associate_roundtrip_and_idempotent() {
        let (engine, store, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        for _ in 0..2 {
            let response = engine.dispatch(&client.test_associate_request(&id));
            assert!(response.success);
            assert_eq!(response.id, id);
            assert!(client.envelope.verify(&response.verifier, &response.nonce));
            // No payload on a liveness probe
            assert_eq!(response.count, None);
            assert_eq!(response.entries, None);
        }

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_always_unknown_association() {
        let (engine, _, _) = engine();
        let client = Client::new();

        let error = engine.handle(&client.test_associate_request("Mock-KPH-bogus")).unwrap_err();
        assert_eq!(error, ProtocolError::UnknownAssociation("Mock-KPH-bogus".into()));

        let error =
            engine.handle(&client.get_logins_request("Mock-KPH-bogus", "https://x.test/")).unwrap_err();
        assert_eq!(error, ProtocolError::UnknownAssociation("Mock-KPH-bogus".into()));
    }

    #[test]
    fn stale_id_after_clear_is_unknown() {
        let (engine, store, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        store.clear();

        let error = engine.handle(&client.test_associate_request(&id)).unwrap_err();
        assert!(matches!(error, ProtocolError::UnknownAssociation(_)));
    }

    #[test]
    fn wrong_key_fails_verifier_check() {
        let (engine, _, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        let impostor = Client {
            key: STANDARD.encode([0x99u8; 32]),
            envelope: CryptoEnvelope::from_base64_key(&STANDARD.encode([0x99u8; 32])).unwrap(),
        };
        let error = engine.handle(&impostor.test_associate_request(&id)).unwrap_err();
        assert_eq!(error, ProtocolError::InvalidVerifier);
    }

    #[test]
    fn missing_id_reported() {
        let (engine, _, _) = engine();
        let client = Client::new();
        associate(&engine, &client);

        let mut request = client.test_associate_request("whatever");
        request.id = None;

        let error = engine.handle(&request).unwrap_err();
        assert_eq!(error, ProtocolError::MissingField("Id"));
        assert_eq!(error.to_string(), "no Id supplied");
    }

    #[test]
    fn get_logins_returns_decryptable_entries() {
        let (engine, _, credentials) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        credentials.set(
            "https://example.com/",
            vec![LoginRecord {
                username: "u".into(),
                password: "p".into(),
                name: "A".into(),
                uuid: "id1".into(),
            }],
        );

        let response = engine.dispatch(&client.get_logins_request(&id, "https://example.com/login"));

        assert!(response.success);
        assert_eq!(response.count, Some(1));
        let entries = response.entries.unwrap();
        assert_eq!(entries.len(), 1);

        // All four fields decrypt under the single response nonce
        let nonce = &response.nonce;
        assert_eq!(client.envelope.decrypt(&entries[0].name, nonce).unwrap(), "A");
        assert_eq!(client.envelope.decrypt(&entries[0].login, nonce).unwrap(), "u");
        assert_eq!(client.envelope.decrypt(&entries[0].password, nonce).unwrap(), "p");
        assert_eq!(client.envelope.decrypt(&entries[0].uuid, nonce).unwrap(), "id1");
        assert_eq!(entries[0].string_fields, None);

        assert!(client.envelope.verify(&response.verifier, nonce));
    }

    #[test]
    fn get_logins_without_match_is_empty_success() {
        let (engine, _, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        let response = engine.dispatch(&client.get_logins_request(&id, "https://unseeded.test/"));

        assert!(response.success);
        assert_eq!(response.count, Some(0));
        assert_eq!(response.entries, Some(vec![]));
    }

    #[test]
    fn get_logins_with_undecryptable_url_fails() {
        let (engine, _, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        let mut request = client.get_logins_request(&id, "https://example.com/");
        request.url = Some(STANDARD.encode([0x7Fu8; 7]));

        assert!(matches!(engine.handle(&request), Err(ProtocolError::Decryption(_))));
    }

    #[test]
    fn unsupported_kinds_rejected() {
        let (engine, _, _) = engine();
        let client = Client::new();
        let id = associate(&engine, &client);

        for kind in ["get-logins-count", "set-login", "delete-everything"] {
            let mut request = client.test_associate_request(&id);
            request.request_type = kind.to_string();

            let error = engine.handle(&request).unwrap_err();
            assert_eq!(error, ProtocolError::UnsupportedRequestType(kind.to_string()));
        }
    }

    #[test]
    fn failure_response_shape() {
        let (engine, _, _) = engine();
        let client = Client::new();

        let response = engine.dispatch(&client.test_associate_request("Mock-KPH-bogus"));

        assert!(!response.success);
        assert_eq!(response.error, "unknown Id \"Mock-KPH-bogus\"");
        assert_eq!(response.id, "Mock-KPH-bogus");
        assert_eq!(response.request_type, "test-associate");
        // No credential leakage on failure
        assert_eq!(response.count, None);
        assert_eq!(response.entries, None);
        assert_eq!(response.nonce, "");
        assert_eq!(response.verifier, "");
    }
}
