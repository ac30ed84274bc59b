//! The verify and install workflow
//!
//! ```text
//! FetchMaterials → ParseCertificate → ExtractPublicKey → ComputeDigest
//!   → VerifySignature → Execute
//! ```
//!
//! Every failure before `Execute` is fatal. Execution takes a [`Verified`],
//! which only [`verify_materials`] hands out.

use crate::config::VerifyConfig;
use crate::error::{abort, Aborted, Error};
use crate::exec::{Executor, Verified};
use crate::release::{fetch_all, ReleaseAssets, ReleaseCoordinates, ReleaseSource};
use crate::scope::Scope;
use sget_crypto::Signature;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// States of the verify workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    FetchMaterials,
    ParseCertificate,
    ExtractPublicKey,
    ComputeDigest,
    VerifySignature,
    Execute,
}

impl fmt::Display for VerifyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type VerifyResult<T> = std::result::Result<T, Aborted<VerifyState>>;

/// Script, certificate and signature container on local disk
#[derive(Debug, Clone)]
pub struct LocalMaterials {
    pub script: PathBuf,
    pub certificate: PathBuf,
    pub signature: PathBuf,
}

/// Check `materials.script` against its certificate and signature
///
/// The script is hashed in chunks, so its size is not bounded by memory.
/// This call does blocking file I/O.
pub fn verify_materials(materials: &LocalMaterials) -> VerifyResult<Verified> {
    tracing::debug!(state = %VerifyState::ParseCertificate, "verify state");
    let pem = std::fs::read(&materials.certificate)
        .map_err(Error::from)
        .map_err(abort(VerifyState::ParseCertificate))?;
    let info = sget_crypto::parse_certificate_pem(&pem)
        .map_err(Error::from)
        .map_err(abort(VerifyState::ParseCertificate))?;

    tracing::debug!(state = %VerifyState::ExtractPublicKey, key = %info.key_algorithm, "verify state");
    let key = info
        .verification_key()
        .map_err(Error::from)
        .map_err(abort(VerifyState::ExtractPublicKey))?;

    tracing::debug!(state = %VerifyState::ComputeDigest, "verify state");
    let digest = sget_crypto::sha256_file(&materials.script)
        .map_err(Error::from)
        .map_err(abort(VerifyState::ComputeDigest))?;

    tracing::debug!(state = %VerifyState::VerifySignature, %digest, "verify state");
    let signature = std::fs::read(&materials.signature)
        .map(Signature::new)
        .map_err(Error::from)
        .map_err(abort(VerifyState::VerifySignature))?;
    key.verify_digest(&digest, &signature)
        .map_err(Error::from)
        .map_err(abort(VerifyState::VerifySignature))?;

    tracing::info!(
        %digest,
        serial = %info.serial_number,
        identity = info.identity.as_deref().unwrap_or("<none>"),
        "signature verified"
    );
    Ok(Verified::new(
        materials.script.clone(),
        digest,
        info.identity,
    ))
}

/// A verified release, kept alive with the temporary directory holding it
///
/// Dropping this value removes the downloaded files.
#[derive(Debug)]
pub struct VerifiedRelease {
    verified: Verified,
    _dir: TempDir,
}

impl VerifiedRelease {
    /// The verification result
    pub fn verified(&self) -> &Verified {
        &self.verified
    }
}

/// Fetches, verifies and runs released scripts
pub struct VerifyWorkflow {
    config: VerifyConfig,
    source: Arc<dyn ReleaseSource>,
}

impl VerifyWorkflow {
    /// Assemble a workflow around a release source
    pub fn new(config: VerifyConfig, source: Arc<dyn ReleaseSource>) -> Self {
        Self { config, source }
    }

    /// The configuration in use
    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Download the release's certificate, signature and script into `dir`
    pub async fn fetch(
        &self,
        release: &ReleaseCoordinates,
        dir: &Path,
        scope: &Scope,
    ) -> crate::Result<LocalMaterials> {
        let listed = scope
            .guard(async {
                match tokio::time::timeout(self.config.fetch_timeout, self.source.list_assets(release))
                    .await
                {
                    Ok(listed) => listed,
                    Err(_) => Err(Error::AssetFetch(format!("listing {} timed out", release))),
                }
            })
            .await?;
        let assets = ReleaseAssets::classify(listed)?;
        let fetched = fetch_all(
            Arc::clone(&self.source),
            &assets,
            dir,
            self.config.fetch_timeout,
            scope,
        )
        .await?;

        Ok(LocalMaterials {
            script: fetched.script,
            certificate: fetched.certificate,
            signature: fetched.signature,
        })
    }

    /// Fetch and verify a release without running it
    pub async fn verify_release(
        &self,
        release: &ReleaseCoordinates,
        cancel: &CancellationToken,
    ) -> VerifyResult<VerifiedRelease> {
        let scope = Scope::new(cancel.clone(), self.config.deadline);
        tracing::debug!(%release, state = %VerifyState::FetchMaterials, "verify state");

        let dir = tempfile::tempdir()
            .map_err(Error::from)
            .map_err(abort(VerifyState::FetchMaterials))?;
        let materials = self
            .fetch(release, dir.path(), &scope)
            .await
            .map_err(abort(VerifyState::FetchMaterials))?;

        let verified = tokio::task::spawn_blocking(move || verify_materials(&materials))
            .await
            .map_err(|e| Aborted {
                state: VerifyState::VerifySignature,
                error: Error::Io(std::io::Error::other(e)),
            })??;
        scope
            .check()
            .map_err(abort(VerifyState::VerifySignature))?;

        Ok(VerifiedRelease {
            verified,
            _dir: dir,
        })
    }

    /// Fetch, verify and run a release, returning the script's exit status
    pub async fn install(
        &self,
        release: &ReleaseCoordinates,
        executor: &Executor,
        cancel: &CancellationToken,
    ) -> VerifyResult<ExitStatus> {
        let VerifiedRelease { verified, _dir } = self.verify_release(release, cancel).await?;
        tracing::debug!(state = %VerifyState::Execute, "verify state");
        executor
            .run(verified)
            .await
            .map_err(abort(VerifyState::Execute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_certificate_stops_in_parse() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "echo hi\n").unwrap();

        let result = verify_materials(&LocalMaterials {
            script,
            certificate: dir.path().join("absent.pem"),
            signature: dir.path().join("absent.bin"),
        });
        let aborted = result.unwrap_err();
        assert_eq!(aborted.state, VerifyState::ParseCertificate);
        assert!(matches!(aborted.error, Error::Io(_)));
    }

    #[test]
    fn test_garbage_certificate_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let certificate = dir.path().join("cert.pem");
        std::fs::write(&certificate, "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n")
            .unwrap();

        let aborted = verify_materials(&LocalMaterials {
            script: dir.path().join("run.sh"),
            certificate,
            signature: dir.path().join("sig.bin"),
        })
        .unwrap_err();
        assert_eq!(aborted.state, VerifyState::ParseCertificate);
        assert!(matches!(aborted.error, Error::MalformedCertificate(_)));
        assert_eq!(aborted.exit_code(), crate::error::EXIT_REJECTED);
    }
}
