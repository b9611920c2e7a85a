//! Authenticated session management
//!
//! Owns the session lifecycle: login, logout, bearer injection, and
//! the single refresh-and-retry cycle on 401 responses. All
//! authenticated traffic goes through [`AuthSession::send`].

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::SessionStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use pd_common::{Session, UserProfile};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Observer for identity changes that originate inside the auth layer.
///
/// Forced logouts (failed refresh, 401 after retry) never pass through
/// the facade, so anything derived from the identity registers here to
/// stay in step with it.
#[async_trait]
pub trait IdentityObserver: Send + Sync {
    async fn identity_changed(&self);
}

/// Login response from `POST /login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct RefreshResponse {
    token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

/// Session-aware HTTP gateway.
///
/// The session moves through Anonymous, Authenticated, and a transient
/// refresh-pending state; an unrecoverable refresh drops it back to
/// Anonymous. Transitions are driven by [`login`](AuthSession::login),
/// [`logout`](AuthSession::logout), and the 401 handling inside
/// [`send`](AuthSession::send).
pub struct AuthSession {
    config: Arc<Config>,
    http: reqwest::Client,
    store: Arc<dyn SessionStore>,
    session: RwLock<Option<Session>>,
    observer: RwLock<Option<Weak<dyn IdentityObserver>>>,
}

impl AuthSession {
    pub fn new(config: Arc<Config>, http: reqwest::Client, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            http,
            store,
            session: RwLock::new(None),
            observer: RwLock::new(None),
        }
    }

    /// Register the observer notified on logout, including the forced
    /// logouts inside [`send`](AuthSession::send). Held weakly so the
    /// observer may itself hold the session.
    pub fn set_identity_observer(&self, observer: Weak<dyn IdentityObserver>) {
        *self.observer.write() = Some(observer);
    }

    async fn notify_identity_changed(&self) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.identity_changed().await;
        }
    }

    /// Hydrate the in-memory session from the store. Called once at
    /// startup by the facade client.
    pub async fn restore(&self) -> Option<Session> {
        let restored = self.store.load().await;
        if let Some(ref session) = restored {
            debug!(user_id = session.user.user_id, "Restored persisted session");
        }
        *self.session.write() = restored.clone();
        restored
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Request builder for an API path. No token is attached here;
    /// [`send`](AuthSession::send) injects whatever token is current.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Authenticate and persist the resulting session.
    ///
    /// The email is lower-cased before sending, matching the backend's
    /// case-insensitive account lookup. A disabled account fails
    /// without persisting anything.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.to_lowercase();
        let response = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest {
                email: &email,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            info!(status = %response.status(), "Login rejected");
            return Err(Error::InvalidCredentials);
        }

        let body: LoginResponse = response.json().await?;
        if !body.user.is_active() {
            info!(user_id = body.user.user_id, "Login refused for inactive account");
            return Err(Error::AccountDisabled);
        }

        let session = Session {
            user: body.user,
            access_token: body.token,
            refresh_token: body.refresh_token,
        };
        self.store.save(&session).await?;
        *self.session.write() = Some(session.clone());
        info!(user_id = session.user.user_id, "Login succeeded");
        Ok(session)
    }

    /// Drop the session everywhere and notify the identity observer.
    /// Safe to call repeatedly.
    pub async fn logout(&self) {
        *self.session.write() = None;
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        debug!("Session cleared");
        self.notify_identity_changed().await;
    }

    /// Issue a request with bearer auth and at most one
    /// refresh-and-retry cycle on 401.
    ///
    /// Non-2xx responses are returned for the caller to inspect; only
    /// transport failures become errors. When the refresh fails, or
    /// the retried request comes back 401 again, the session is
    /// dropped and the caller still receives the response.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let retry_builder = builder.try_clone();

        let first = self.attach_token(builder).send().await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(first);
        }

        // Streaming bodies cannot be cloned, so they cannot be retried.
        let Some(retry_builder) = retry_builder else {
            return Ok(first);
        };

        if !self.refresh().await {
            warn!("Token refresh failed, dropping session");
            self.logout().await;
            return Ok(first);
        }

        let second = self.attach_token(retry_builder).send().await?;
        if second.status() == StatusCode::UNAUTHORIZED {
            warn!("Request unauthorized after refresh, dropping session");
            self.logout().await;
        }
        Ok(second)
    }

    fn attach_token(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns false, leaving the session untouched, when no refresh
    /// token is held or the exchange fails in any way. On success the
    /// refresh token is replaced only if the server issued a new one.
    pub async fn refresh(&self) -> bool {
        let refresh_token = {
            let session = self.session.read();
            match session.as_ref().and_then(|s| s.refresh_token.clone()) {
                Some(token) => token,
                None => return false,
            }
        };

        let response = match self
            .http
            .post(self.url("/refresh"))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Refresh request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Refresh rejected");
            return false;
        }

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Refresh response unreadable");
                return false;
            }
        };

        let updated = {
            let mut guard = self.session.write();
            let Some(session) = guard.as_mut() else {
                // Logged out while the refresh was in flight.
                return false;
            };
            session.access_token = body.token;
            if let Some(new_refresh) = body.refresh_token {
                session.refresh_token = Some(new_refresh);
            }
            session.clone()
        };

        if let Err(e) = self.store.save(&updated).await {
            warn!(error = %e, "Failed to persist refreshed session");
        }
        debug!("Access token refreshed");
        true
    }

    /// Re-fetch the canonical profile for the logged-in user.
    ///
    /// No-op when anonymous or when the server answers non-2xx; the
    /// stored user is replaced and persisted only on success.
    pub async fn refresh_profile(&self) -> Result<()> {
        if !self.is_authenticated() {
            return Ok(());
        }

        let response = self.send(self.request(Method::GET, "/me")).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Profile refresh skipped");
            return Ok(());
        }

        let user: UserProfile = response.json().await?;
        let updated = {
            let mut guard = self.session.write();
            let Some(session) = guard.as_mut() else {
                return Ok(());
            };
            session.user = user;
            session.clone()
        };

        if let Err(e) = self.store.save(&updated).await {
            warn!(error = %e, "Failed to persist refreshed profile");
        }
        Ok(())
    }
}
