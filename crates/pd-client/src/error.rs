//! Error types for the Pipedeck client

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for Pipedeck client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Pipedeck client
#[derive(Error, Debug)]
pub enum Error {
    /// Login rejected by the server
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login accepted at the transport level but the account is not active
    #[error("Account is disabled")]
    AccountDisabled,

    /// Non-success API response, with the server's message body when present
    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Duplicate detected client-side before a write
    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session storage failure
    #[error("Session storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl Error {
    pub(crate) fn storage(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.display().to_string(),
            source,
        }
    }

    /// Drain a non-success response into an [`Error::Api`], preferring
    /// the backend's `{message}` body over the status text.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Error::Api { status, message }
    }

    /// True for the client-side duplicate rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate { .. })
    }
}
