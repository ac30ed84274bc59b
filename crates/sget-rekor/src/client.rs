//! Rekor client for transparency log operations

use crate::entry::{single_entry, HashedRekord, LogEntry, LogEntryResponse};
use crate::error::{Error, Result};
use std::time::Duration;

/// The public Sigstore Rekor instance
pub const PUBLIC_URL: &str = "https://rekor.sigstore.dev";
/// The Sigstore staging Rekor instance
pub const STAGING_URL: &str = "https://rekor.sigstage.dev";

/// A client for interacting with Rekor
pub struct RekorClient {
    /// Base URL of the Rekor instance
    url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl RekorClient {
    /// Create a new Rekor client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL this client talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where an entry can be fetched from
    pub fn entry_url(&self, uuid: &str) -> String {
        format!("{}/api/v1/log/entries/{}", self.url, uuid)
    }

    /// Create a new log entry
    pub async fn create_entry(&self, entry: HashedRekord) -> Result<LogEntry> {
        let url = format!("{}/api/v1/log/entries", self.url);
        tracing::debug!(%url, "submitting hashedrekord entry");

        let response = self
            .client
            .post(&url)
            .json(&entry)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(Error::Conflict { location });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let entries: LogEntryResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        single_entry(entries).ok_or_else(|| Error::InvalidResponse("empty response".to_string()))
    }
}
