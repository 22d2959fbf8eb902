//! Typed async HTTP client for the portal REST API.
//!
//! # Overview
//! `ApiClient` resolves paths against a base URL, attaches a bearer token,
//! encodes JSON bodies, enforces a per-call timeout, and normalizes every
//! failure into one `ApiError`. A 401 can trigger a token refresh, which
//! marks the error as retryable; retrying is left to the caller.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest` / `HttpResponse`).
//!   Building and parsing are pure; only a `Transport` does I/O, so the
//!   client can be exercised against in-process doubles.
//! - Config is snapshotted per call; `configure` never affects calls
//!   already in flight.
//! - Token storage and refresh are injected (`TokenStore`,
//!   `TokenRefresher`); the client has no global state.
//! - Envelopes and endpoint tables (`envelope`, `endpoints`) sit on top of
//!   the client and are optional.

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod http;
pub mod query;
pub mod session;
pub mod types;

pub use auth::{MemoryTokenStore, TokenRefresher, TokenStore};
pub use client::ApiClient;
pub use config::{ClientConfig, ConfigUpdate, RequestOptions};
pub use envelope::Envelope;
pub use error::{ApiError, ServerError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use query::Query;
pub use session::Session;
pub use types::{AuthTokens, CreateJob, Empty, Job, JobFilter, JobList, UpdateJob, User};
pub use tokio_util::sync::CancellationToken;
