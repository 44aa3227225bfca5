//! HTTP transport for the KeePassHttp mock.
//!
//! Two POST paths: `/` speaks the protocol (request/response envelopes) and
//! `/setup` lets a test harness seed credentials and reset state between
//! scenarios. The transport owns exactly one error: a body that is not valid
//! JSON is rejected with a non-200 status before it ever reaches the engine.
//! Every protocol-level failure still comes back as a 200 with
//! `Success: false`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod routes;

pub use routes::{AppState, build_router};
