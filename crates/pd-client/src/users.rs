//! User directory and administration endpoints.

use crate::auth::AuthSession;
use crate::error::{Error, Result};
use pd_common::{NewUser, RoleInfo, UserProfile};
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize)]
struct PasswordChange<'a> {
    password: &'a str,
}

/// User endpoints. Obtained from [`Client::users`](crate::Client::users).
pub struct Users {
    auth: Arc<AuthSession>,
}

impl Users {
    pub(crate) fn new(auth: Arc<AuthSession>) -> Self {
        Self { auth }
    }

    /// Every user visible to the caller's role.
    pub async fn list(&self) -> Result<Vec<UserProfile>> {
        let request = self.auth.request(Method::GET, "/users");
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// Users a lead may be assigned to.
    pub async fn assignable(&self) -> Result<Vec<UserProfile>> {
        let request = self.auth.request(Method::GET, "/assignable-users");
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn roles(&self) -> Result<Vec<RoleInfo>> {
        let request = self.auth.request(Method::GET, "/roles");
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn create(&self, new_user: &NewUser) -> Result<UserProfile> {
        let request = self.auth.request(Method::POST, "/users").json(new_user);
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let user: UserProfile = response.json().await?;
        debug!(user_id = user.user_id, "User created");
        Ok(user)
    }

    pub async fn set_password(&self, user_id: i64, password: &str) -> Result<()> {
        let path = format!("/users/{user_id}/password");
        let request = self
            .auth
            .request(Method::POST, &path)
            .json(&PasswordChange { password });
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        debug!(user_id, "Password changed");
        Ok(())
    }
}
