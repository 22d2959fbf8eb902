//! Login state on top of `ApiClient`.
//!
//! # Design
//! `Session` owns the refresh token and writes the access token into a
//! `TokenStore`. Attaching a session points the client's token getter at the
//! store and installs the session as the 401 refresher. The refresher holds
//! only a `Weak` reference, so the client does not keep the session alive.
//!
//! A 401 that the session cannot recover from (no refresh token, or the
//! refresh call fails) clears the store. Redirecting to a login screen is
//! left to the application.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{info, warn};

use crate::auth::TokenStore;
use crate::client::ApiClient;
use crate::config::ConfigUpdate;
use crate::error::ApiError;
use crate::http::Transport;
use crate::types::{LoginRequest, User};

pub struct Session<T> {
    client: Arc<ApiClient<T>>,
    tokens: Arc<dyn TokenStore>,
    refresh_token: RwLock<Option<String>>,
}

impl<T: Transport + 'static> Session<T> {
    pub fn attach(client: Arc<ApiClient<T>>, tokens: Arc<dyn TokenStore>) -> Arc<Self> {
        let session = Arc::new(Self {
            client: Arc::clone(&client),
            tokens: Arc::clone(&tokens),
            refresh_token: RwLock::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&session);
        client.configure(
            ConfigUpdate::new()
                .token_store(tokens)
                .on_token_expired(move || {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(session) => session.refresh().await,
                            None => None,
                        }
                    }
                }),
        );
        session
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.get().is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let issued = self.client.auth().login(&request).await?;
        self.tokens.set(issued.token);
        self.set_refresh_token(Some(issued.refresh_token));
        info!(user = %issued.user.email, "logged in");
        Ok(issued.user)
    }

    /// Revoke the token server-side and forget it locally. Local state is
    /// cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = if self.is_authenticated() {
            self.client.auth().logout().await
        } else {
            Ok(())
        };
        self.tokens.clear();
        self.set_refresh_token(None);
        result
    }

    /// Exchange the refresh token for a new access token and store it.
    ///
    /// The stored refresh token is taken before the call goes out, so a
    /// rejected refresh can never be sent twice.
    pub async fn refresh(&self) -> Option<String> {
        let refresh_token = self
            .refresh_token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(refresh_token) = refresh_token else {
            self.tokens.clear();
            return None;
        };

        match self.client.auth().refresh(&refresh_token).await {
            Ok(issued) => {
                self.tokens.set(issued.token.clone());
                self.set_refresh_token(Some(issued.refresh_token));
                Some(issued.token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.tokens.clear();
                self.set_refresh_token(None);
                None
            }
        }
    }

    fn set_refresh_token(&self, token: Option<String>) {
        *self
            .refresh_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }
}
