//! Error types for sget-fulcio

use thiserror::Error;

/// Errors that can occur in Fulcio operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Fulcio answered with a non-success status
    #[error("certificate request rejected with status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(String),
}

impl Error {
    /// The HTTP status, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-side failures may succeed on a later attempt; client errors never will
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Status { status, .. } if (500..600).contains(status))
    }
}

impl From<sget_crypto::Error> for Error {
    fn from(e: sget_crypto::Error) -> Self {
        Error::Certificate(e.to_string())
    }
}

/// Result type for Fulcio operations
pub type Result<T> = std::result::Result<T, Error>;
