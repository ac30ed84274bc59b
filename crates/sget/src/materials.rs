//! On-disk layout of sign materials
//!
//! ```text
//! {store_root}/{timestamp}/
//!     signature_{timestamp}.bin
//!     fulcio_cert_{timestamp}.pem
//!     rekor_entry_{timestamp}.json
//! ```
//!
//! The timestamp is captured in nanoseconds when the sign workflow starts and
//! doubles as the identifier of the materials.

use crate::error::{Error, Result};
use serde::Serialize;
use sget_crypto::{CertificateDer, Signature};
use sget_rekor::LogEntry;
use std::path::{Path, PathBuf};

/// Nanosecond timestamp identifying one sign invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialsId(i64);

impl MaterialsId {
    /// Capture the current time
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        // timestamp_nanos_opt only fails after the year 2262
        Self(now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000))
    }

    /// Wrap an existing timestamp
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// The raw nanosecond value
    pub fn as_nanos(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MaterialsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paths of the files one sign invocation writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materials {
    /// Identifier shared by the directory and file names
    #[serde(skip)]
    pub id: MaterialsId,
    /// The per-invocation directory
    pub dir: PathBuf,
    /// DER signature container
    pub signature: PathBuf,
    /// PEM leaf certificate
    pub certificate: PathBuf,
    /// Log entry reference
    pub log_entry: PathBuf,
}

impl Materials {
    /// Layout for `id` under `store_root`; nothing is touched on disk
    pub fn layout(store_root: &Path, id: MaterialsId) -> Self {
        let dir = store_root.join(id.to_string());
        Self {
            id,
            signature: dir.join(format!("signature_{}.bin", id)),
            certificate: dir.join(format!("fulcio_cert_{}.pem", id)),
            log_entry: dir.join(format!("rekor_entry_{}.json", id)),
            dir,
        }
    }

    /// Write signature, leaf certificate and log reference
    ///
    /// The directory must not exist yet: each invocation owns its directory
    /// exclusively.
    pub async fn persist(
        store_root: &Path,
        id: MaterialsId,
        signature: &Signature,
        leaf: &CertificateDer,
        entry: &LogEntry,
    ) -> Result<Self> {
        let materials = Self::layout(store_root, id);

        tokio::fs::create_dir_all(store_root).await?;
        tokio::fs::create_dir(&materials.dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::Config(format!(
                    "materials directory {} already exists",
                    materials.dir.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        tokio::fs::write(&materials.signature, signature.as_bytes()).await?;
        tokio::fs::write(&materials.certificate, leaf.to_pem()).await?;
        let record = serde_json::to_vec_pretty(entry)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        tokio::fs::write(&materials.log_entry, record).await?;

        tracing::debug!(dir = %materials.dir.display(), "materials written");
        Ok(materials)
    }
}
