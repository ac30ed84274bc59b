//! Error types for sget-rekor

use thiserror::Error;

/// Errors that can occur in Rekor operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(String),

    /// API error
    #[error("API error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// The log already holds an identical entry
    #[error("entry already exists in the log{}", .location.as_deref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Conflict {
        /// Location of the existing entry, when the log reports it
        location: Option<String>,
    },

    /// Response did not contain an entry
    #[error("invalid log response: {0}")]
    InvalidResponse(String),
}

/// Result type for Rekor operations
pub type Result<T> = std::result::Result<T, Error>;
