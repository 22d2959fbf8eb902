//! Token capabilities injected into the client.
//!
//! # Design
//! The client never reads or writes token storage directly. It asks a token
//! getter for the current bearer token and, on a 401, asks a
//! `TokenRefresher` for a new one. Where tokens live (memory, disk, keyring)
//! is decided by whoever implements `TokenStore`.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

/// Storage for the current bearer token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn clear(&self);
}

/// Process-local `TokenStore`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Obtains a fresh bearer token after the server rejected the current one.
///
/// Returning `None` means no new token could be obtained; the 401 is then
/// reported without `should_retry`.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Option<String>;
}

#[async_trait]
impl<F, Fut> TokenRefresher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send,
{
    async fn refresh(&self) -> Option<String> {
        self().await
    }
}
