//! Client facade.
//!
//! Owns the HTTP client, session, and access map, and hands out the
//! endpoint groups. Access map refreshes are driven from here, once
//! per identity change, so callers never coordinate them.

use crate::access::RoleAccess;
use crate::auth::{AuthSession, IdentityObserver};
use crate::config::Config;
use crate::error::Result;
use crate::leads::Leads;
use crate::scan::SearchScanner;
use crate::session::{FileSessionStore, SessionStore};
use crate::users::Users;
use pd_common::{Lead, Session, UserProfile};
use std::sync::{Arc, Weak};

/// Handle to one CRM backend. Cheap to clone; clones share the
/// session and access map.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    auth: Arc<AuthSession>,
    access: Arc<RoleAccess>,
}

impl Client {
    /// Build a client with a file-backed session store at
    /// `config.session_file`, restoring any persisted session.
    pub async fn new(config: Config) -> Result<Client> {
        let store = Arc::new(FileSessionStore::new(config.session_file.clone()));
        Self::with_store(config, store).await
    }

    /// Build a client over a caller-provided session store.
    pub async fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Result<Client> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let config = Arc::new(config);
        let auth = Arc::new(AuthSession::new(config.clone(), http, store));
        let access = Arc::new(RoleAccess::new(auth.clone()));
        // Logouts forced inside the auth layer must empty the map too.
        let observer: Weak<dyn IdentityObserver> =
            Arc::downgrade(&(access.clone() as Arc<dyn IdentityObserver>));
        auth.set_identity_observer(observer);
        let client = Client {
            config,
            auth,
            access,
        };

        if client.auth.restore().await.is_some() {
            client.access.refresh().await;
        }
        Ok(client)
    }

    /// Log in and resolve the access map for the new identity.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.auth.login(email, password).await?;
        self.access.refresh().await;
        Ok(session)
    }

    /// Drop the session. The access map empties with it via the
    /// identity observer on [`AuthSession`].
    pub async fn logout(&self) {
        self.auth.logout().await;
    }

    /// Re-fetch the current user's profile, refreshing the access map
    /// only when the identity actually changed.
    pub async fn refresh_profile(&self) -> Result<()> {
        let before = self.identity();
        self.auth.refresh_profile().await?;
        if self.identity() != before {
            self.access.refresh().await;
        }
        Ok(())
    }

    fn identity(&self) -> Option<(i64, i64)> {
        self.auth.current_user().map(|u| (u.user_id, u.role_id))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn access(&self) -> &RoleAccess {
        &self.access
    }

    pub fn session(&self) -> Option<Session> {
        self.auth.current_session()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.auth.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn leads(&self) -> Leads {
        Leads::new(self.auth.clone(), self.config.clone())
    }

    pub fn users(&self) -> Users {
        Users::new(self.auth.clone())
    }

    /// A progressive scanner over the lead listing.
    pub fn lead_scanner(&self) -> SearchScanner<Lead> {
        SearchScanner::new(
            Arc::new(self.leads()),
            self.config.page_size,
            self.config.max_scan_pages,
        )
    }
}
