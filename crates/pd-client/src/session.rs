//! Session persistence
//!
//! One JSON document holds the whole session, so a partial session can
//! never be written. Absent or unreadable state loads as `None` rather
//! than an error.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use pd_common::Session;
use std::path::PathBuf;
use tracing::warn;

/// Durable storage for the authenticated session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the persisted session. Absent or malformed state is `None`.
    async fn load(&self) -> Option<Session>;

    /// Overwrite the persisted session as a single document.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove the persisted session. Idempotent.
    async fn clear(&self) -> Result<()>;
}

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Option<Session> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed session file");
                None
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::storage(&self.path, e))?;
            }
        }
        let raw = serde_json::to_string(session)?;
        std::fs::write(&self.path, raw).map_err(|e| Error::storage(&self.path, e))
    }

    async fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(&self.path, e)),
        }
    }
}

/// In-memory session store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Option<Session> {
        self.session.read().clone()
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.write() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.write() = None;
        Ok(())
    }
}
