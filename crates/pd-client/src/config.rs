//! Client configuration

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Pipedeck client
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the CRM API, without a trailing slash
    pub base_url: String,

    /// Request timeout applied to every call
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Where the session blob is persisted
    pub session_file: PathBuf,

    /// `take` value for paginated listings
    pub page_size: usize,

    /// Page ceiling for one progressive scan, counting the seed page
    pub max_scan_pages: usize,
}

impl Config {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Pipedeck-Rust-Client/{}", env!("CARGO_PKG_VERSION")),
            session_file: PathBuf::from(".pipedeck/session.json"),
            page_size: 20,
            max_scan_pages: 100,
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the session file path
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Set the listing page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the progressive-scan page ceiling
    pub fn with_max_scan_pages(mut self, max_scan_pages: usize) -> Self {
        self.max_scan_pages = max_scan_pages;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.max_scan_pages == 0 {
            return Err(Error::Config(
                "max_scan_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}
