//! Router and request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use kph_core::{AssociationStore, LoginRecord, MemoryCredentials, ProtocolEngine, RequestEnvelope};
use serde::Deserialize;
use tracing::{debug, error};

/// Rejection body for unparseable requests. The exact text is part of the
/// wire contract.
const BAD_JSON: &str = "Body doesn't contain valid JSON data";

/// Shared application state.
///
/// The engine, the association store, and the credential store all
/// clone-share their interiors, so the setup path mutates the same state the
/// engine reads.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<ProtocolEngine<MemoryCredentials>>,
    store: AssociationStore,
    credentials: MemoryCredentials,
}

impl AppState {
    /// Fresh state with empty stores.
    pub fn new() -> Self {
        let store = AssociationStore::new();
        let credentials = MemoryCredentials::new();
        let engine = Arc::new(ProtocolEngine::new(store.clone(), credentials.clone()));
        Self { engine, store, credentials }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the router: protocol on `/`, harness seeding on `/setup`.
pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", post(protocol))
        .route("/setup", post(setup))
        .with_state(state)
}

/// `POST /`: one protocol round trip.
///
/// Dispatch runs on the blocking pool: the credential lookup inside
/// `get-logins` is allowed to block, and a slow lookup must not stall
/// unrelated connections.
async fn protocol(State(state): State<AppState>, body: String) -> Response {
    let request: RequestEnvelope = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(parse_error) => {
            debug!(%parse_error, "rejecting unparseable protocol body");
            return (StatusCode::UNAUTHORIZED, BAD_JSON).into_response();
        },
    };

    let engine = Arc::clone(&state.engine);
    match tokio::task::spawn_blocking(move || engine.dispatch(&request)).await {
        Ok(response) => Json(response).into_response(),
        Err(join_error) => {
            error!(%join_error, "dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

/// Body of a `POST /setup` request.
#[derive(Debug, Deserialize)]
struct SetupRequest {
    /// Wipe all previous state (associations and credentials) first.
    #[serde(default)]
    clear: bool,
    /// Credentials to seed, grouped by URL.
    #[serde(default)]
    logins: Option<Vec<SeedLogins>>,
}

/// One seeded URL with its login records.
#[derive(Debug, Deserialize)]
struct SeedLogins {
    url: String,
    logins: Vec<LoginRecord>,
}

/// `POST /setup`: reset and/or seed test state. Replies with an empty JSON
/// object.
async fn setup(State(state): State<AppState>, body: String) -> Response {
    let request: SetupRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(parse_error) => {
            debug!(%parse_error, "rejecting unparseable setup body");
            return (StatusCode::UNAUTHORIZED, BAD_JSON).into_response();
        },
    };

    if request.clear {
        debug!("setup: clearing associations and credentials");
        state.store.clear();
        state.credentials.clear();
    }

    if let Some(seeds) = request.logins {
        debug!(urls = seeds.len(), "setup: seeding logins");
        for seed in seeds {
            state.credentials.set(&seed.url, seed.logins);
        }
    }

    Json(serde_json::json!({})).into_response()
}
