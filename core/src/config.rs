//! Client and per-request configuration.
//!
//! # Design
//! `ClientConfig` is immutable once handed to a client. `ApiClient::configure`
//! applies a `ConfigUpdate` by building a new config and swapping it in, so a
//! call that already took its snapshot keeps the values it started with.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::{TokenRefresher, TokenStore};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Returns the current bearer token, if any.
pub type TokenGetter = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_getter: Option<TokenGetter>,
    pub on_token_expired: Option<Arc<dyn TokenRefresher>>,
    pub default_headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token_getter: None,
            on_token_expired: None,
            default_headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn token_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.token_getter = Some(Arc::new(getter));
        self
    }

    /// Read the bearer token from `store` on every request.
    pub fn token_store(self, store: Arc<dyn TokenStore>) -> Self {
        self.token_getter(move || store.get())
    }

    pub fn on_token_expired(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.on_token_expired = Some(Arc::new(refresher));
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn apply(&mut self, update: ConfigUpdate) {
        if let Some(base_url) = update.base_url {
            self.base_url = base_url;
        }
        if let Some(getter) = update.token_getter {
            self.token_getter = getter;
        }
        if let Some(refresher) = update.on_token_expired {
            self.on_token_expired = refresher;
        }
        if let Some(headers) = update.default_headers {
            self.default_headers = headers;
        }
        if let Some(timeout) = update.timeout {
            self.timeout = timeout;
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token_getter", &self.token_getter.is_some())
            .field("on_token_expired", &self.on_token_expired.is_some())
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Partial `ClientConfig`. Fields left unset keep their current value;
/// `default_headers` replaces the whole map.
#[derive(Default)]
pub struct ConfigUpdate {
    base_url: Option<String>,
    token_getter: Option<Option<TokenGetter>>,
    on_token_expired: Option<Option<Arc<dyn TokenRefresher>>>,
    default_headers: Option<BTreeMap<String, String>>,
    timeout: Option<Duration>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn token_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.token_getter = Some(Some(Arc::new(getter)));
        self
    }

    pub fn token_store(self, store: Arc<dyn TokenStore>) -> Self {
        self.token_getter(move || store.get())
    }

    pub fn clear_token_getter(mut self) -> Self {
        self.token_getter = Some(None);
        self
    }

    pub fn on_token_expired(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.on_token_expired = Some(Some(Arc::new(refresher)));
        self
    }

    pub fn clear_on_token_expired(mut self) -> Self {
        self.on_token_expired = Some(None);
        self
    }

    pub fn default_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.default_headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub extra_headers: BTreeMap<String, String>,
    /// Never attach `Authorization`, even when a token is available.
    pub skip_auth: bool,
    /// Overrides `ClientConfig::timeout` for this call.
    pub timeout: Option<Duration>,
    /// Cancelling this token aborts the call.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
