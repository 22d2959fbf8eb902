//! Typed HTTP client for the portal REST API.
//!
//! # Design
//! A call runs in three steps. `build_request` turns the config snapshot and
//! call arguments into an `HttpRequest`; the `Transport` executes it while
//! racing the timeout and the caller's cancellation token; `parse_response`
//! or `normalize_error` interprets the `HttpResponse`. The first and last
//! steps are pure functions and are public so they can be tested without a
//! server.
//!
//! The client holds its config behind `RwLock<Arc<_>>`. Each call clones the
//! `Arc` once at the start, so `configure` never changes a call that is
//! already under way. Nothing else is shared between calls.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ConfigUpdate, RequestOptions};
use crate::error::{ApiError, ServerError, UNKNOWN_ERROR};
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::query::Query;

/// Portal API client, generic over the transport that performs the I/O.
pub struct ApiClient<T = ReqwestTransport> {
    config: RwLock<Arc<ClientConfig>>,
    transport: T,
}

impl ApiClient<ReqwestTransport> {
    pub fn with_reqwest(config: ClientConfig) -> Self {
        Self::new(config, ReqwestTransport::default())
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            transport,
        }
    }

    /// Merge `update` into the held config. Calls already in flight keep
    /// the snapshot they started with.
    pub fn configure(&self, update: ConfigUpdate) {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = ClientConfig::clone(&current);
        next.apply(update);
        *current = Arc::new(next);
    }

    /// The config a call started now would use.
    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&Query>,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.request(HttpMethod::Get, path, query, None::<&()>, options)
            .await
    }

    pub async fn post<R, B>(
        &self,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpMethod::Post, path, None, body, options).await
    }

    pub async fn put<R, B>(
        &self,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(HttpMethod::Put, path, None, body, options).await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.request(HttpMethod::Delete, path, None, None::<&()>, options)
            .await
    }

    async fn request<R, B>(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&Query>,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let config = self.config();
        let request = build_request(&config, method, path, query, body, &options)?;
        let timeout = options.timeout.unwrap_or(config.timeout);

        let response = self
            .execute(request, timeout, options.cancel.as_ref())
            .await?;

        if response.is_success() {
            return parse_response(&response);
        }

        let mut error = normalize_error(&response);
        // A request that carried no token cannot have an expired one.
        if error.http_status == 401 && !options.skip_auth {
            if let Some(refresher) = &config.on_token_expired {
                if refresher.refresh().await.is_some() {
                    info!(%path, "token refreshed after 401, caller may retry");
                    error.should_retry = true;
                }
            }
        }
        Err(ApiError::Server(error))
    }

    async fn execute(
        &self,
        request: HttpRequest,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse, ApiError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        let started = Instant::now();
        debug!(method, %url, "sending request");

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        // The timer lives inside this select and is dropped with it on every path.
        let outcome = tokio::select! {
            biased;
            () = cancelled => Err(ApiError::Aborted),
            result = self.transport.send(request) => {
                result.map_err(|e| ApiError::Transport(e.0))
            }
            () = tokio::time::sleep(timeout) => Err(ApiError::Timeout { after: timeout }),
        };

        let elapsed = started.elapsed();
        match &outcome {
            Ok(response) => {
                debug!(method, %url, status = response.status, ?elapsed, "received response")
            }
            Err(e) => warn!(method, %url, ?elapsed, error = %e, "request failed"),
        }
        outcome
    }
}

/// Build the outgoing request from a config snapshot and call arguments.
pub fn build_request<B: Serialize + ?Sized>(
    config: &ClientConfig,
    method: HttpMethod,
    path: &str,
    query: Option<&Query>,
    body: Option<&B>,
    options: &RequestOptions,
) -> Result<HttpRequest, ApiError> {
    let mut url = join_url(&config.base_url, path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.encode());
    }

    let mut headers = Vec::new();
    set_header(&mut headers, "content-type", "application/json");
    for (name, value) in &config.default_headers {
        set_header(&mut headers, name, value);
    }
    for (name, value) in &options.extra_headers {
        set_header(&mut headers, name, value);
    }
    if !options.skip_auth {
        if let Some(token) = config.token_getter.as_ref().and_then(|getter| getter()) {
            set_header(&mut headers, "authorization", &format!("Bearer {token}"));
        }
    }

    let body = body
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::Serialization(e.to_string()))?;

    Ok(HttpRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Decode a 2xx response. 204 and empty bodies decode as `{}`.
pub fn parse_response<R: DeserializeOwned>(response: &HttpResponse) -> Result<R, ApiError> {
    if response.status == 204 || response.body.trim().is_empty() {
        return serde_json::from_value(Value::Object(Map::new()))
            .map_err(|e| ApiError::Deserialization(e.to_string()));
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Turn a non-2xx response into a `ServerError`.
///
/// `code` may be a string or a number in the body; numbers are stringified.
/// Missing fields, or a body that is not JSON, fall back to `UNKNOWN_ERROR`
/// and the status's reason phrase.
pub fn normalize_error(response: &HttpResponse) -> ServerError {
    let body = serde_json::from_str::<Value>(&response.body).ok();
    let field = |name: &str| body.as_ref().and_then(|b| b.get(name)).cloned();

    let code = match field("code") {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => UNKNOWN_ERROR.to_string(),
    };
    let message = match field("message") {
        Some(Value::String(message)) => message,
        _ => reason_phrase(response.status),
    };
    let details = field("details").filter(|d| !d.is_null());

    ServerError {
        code,
        message,
        details,
        http_status: response.status,
        should_retry: false,
    }
}

fn reason_phrase(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
