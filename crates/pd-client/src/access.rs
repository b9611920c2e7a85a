//! Role-based component access
//!
//! Resolves the server's permission matrix against the active user's
//! role into a flat component-to-allowed map. Lookups are synchronous
//! and fail closed: a component the matrix never mentioned is denied.

use crate::auth::{AuthSession, IdentityObserver};
use async_trait::async_trait;
use parking_lot::RwLock;
use pd_common::{resolve_access, PermissionMatrix};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RoleAccess {
    auth: Arc<AuthSession>,
    map: RwLock<HashMap<String, bool>>,
}

impl RoleAccess {
    pub fn new(auth: Arc<AuthSession>) -> Self {
        Self {
            auth,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Recompute the access map for the current identity.
    ///
    /// With no identity the map empties. Fetch, status, and decode
    /// failures keep the previous map untouched; a successful fetch
    /// replaces it wholesale.
    pub async fn refresh(&self) {
        let Some(user) = self.auth.current_user() else {
            self.map.write().clear();
            debug!("Access map cleared");
            return;
        };

        let request = self.auth.request(Method::GET, "/role-access");
        let response = match self.auth.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Role access fetch failed, keeping previous map");
                return;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Role access fetch rejected, keeping previous map");
            return;
        }
        let matrix: PermissionMatrix = match response.json().await {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!(error = %e, "Role access payload unreadable, keeping previous map");
                return;
            }
        };

        let resolved = resolve_access(&matrix, user.role_id);
        debug!(
            components = resolved.len(),
            role_id = user.role_id,
            "Access map resolved"
        );
        *self.map.write() = resolved;
    }

    /// Fail-closed component lookup.
    pub fn is_allowed(&self, component_id: &str) -> bool {
        self.map.read().get(component_id).copied().unwrap_or(false)
    }

    /// Visibility for navigation surfaces. Surfaces without a
    /// component tag are always visible; tagged ones go through
    /// [`is_allowed`](RoleAccess::is_allowed).
    pub fn is_visible(&self, component_id: Option<&str>) -> bool {
        component_id.map_or(true, |id| self.is_allowed(id))
    }

    /// Copy of the current map, for diagnostics.
    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.map.read().clone()
    }
}

/// Keeps the map in step with logouts forced from inside the auth
/// layer, which never pass through the facade.
#[async_trait]
impl IdentityObserver for RoleAccess {
    async fn identity_changed(&self) {
        self.refresh().await;
    }
}
