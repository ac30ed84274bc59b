//! The sign workflow
//!
//! ```text
//! ReadArtifact → ValidateContentType → Authenticate → GenerateKeyPair
//!   → ProvePossession → RequestCertificate → SignArtifact → UploadToLog
//!   → PersistMaterials → [Publish] → Done
//! ```
//!
//! Nothing is written to disk before the log has accepted the signature, so
//! an aborted run leaves no materials behind.

use crate::config::SignConfig;
use crate::content::ensure_plain_text;
use crate::error::{abort, Aborted, Error, Result};
use crate::identity::IdentityProvider;
use crate::materials::{Materials, MaterialsId};
use crate::publish::{PublishTarget, Publisher};
use crate::scope::Scope;
use crate::services::{CertificateAuthority, FulcioAuthority, RekorLog, TransparencyLog};
use sget_crypto::{EphemeralKeyPair, PublicKeySpki, Sha256Hash, Signature};
use sget_fulcio::{CertificateChain, FulcioClient};
use sget_oidc::IdentityToken;
use sget_rekor::{LogEntry, RekorClient};
use std::fmt;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// States of the sign workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignState {
    ReadArtifact,
    ValidateContentType,
    Authenticate,
    GenerateKeyPair,
    ProvePossession,
    RequestCertificate,
    SignArtifact,
    UploadToLog,
    PersistMaterials,
    Publish,
    Done,
}

impl fmt::Display for SignState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a successful sign run produced
#[derive(Debug, Clone)]
pub struct SignOutcome {
    /// Files written for this run
    pub materials: Materials,
    /// Digest of the signed artifact
    pub digest: Sha256Hash,
    /// Serial number of the leaf certificate, hex encoded
    pub serial: String,
    /// Identity the certificate was issued to
    pub identity: Option<String>,
    /// Reference to the log entry
    pub log_entry: LogEntry,
}

/// Signs scripts with short-lived certificates
pub struct SignWorkflow {
    config: SignConfig,
    identity: Box<dyn IdentityProvider>,
    authority: Box<dyn CertificateAuthority>,
    log: Box<dyn TransparencyLog>,
    publisher: Option<(Box<dyn Publisher>, PublishTarget)>,
}

impl SignWorkflow {
    /// Assemble a workflow from its collaborators
    pub fn new(
        config: SignConfig,
        identity: Box<dyn IdentityProvider>,
        authority: Box<dyn CertificateAuthority>,
        log: Box<dyn TransparencyLog>,
    ) -> Self {
        Self {
            config,
            identity,
            authority,
            log,
            publisher: None,
        }
    }

    /// Workflow talking to the Fulcio and Rekor instances named in `config`
    pub fn connect(config: SignConfig, identity: Box<dyn IdentityProvider>) -> Result<Self> {
        let fulcio = FulcioClient::with_timeout(&config.fulcio_url, config.request_timeout)
            .map_err(|e| Error::Config(format!("certificate authority client: {}", e)))?;
        let rekor = RekorClient::with_timeout(&config.rekor_url, config.request_timeout)
            .map_err(|e| Error::Config(format!("transparency log client: {}", e)))?;
        Ok(Self::new(
            config,
            identity,
            Box::new(FulcioAuthority::new(fulcio)),
            Box::new(RekorLog::new(rekor)),
        ))
    }

    /// Hand persisted materials to `publisher` for `target`
    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>, target: PublishTarget) -> Self {
        self.publisher = Some((publisher, target));
        self
    }

    /// The configuration in use
    pub fn config(&self) -> &SignConfig {
        &self.config
    }

    /// Sign the script at `artifact`
    pub async fn sign(
        &self,
        artifact: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<SignOutcome, Aborted<SignState>> {
        let id = MaterialsId::now();
        let scope = Scope::new(cancel.clone(), self.config.deadline);
        tracing::debug!(artifact = %artifact.display(), %id, "sign workflow started");

        transition(&scope, SignState::ReadArtifact)?;
        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(Error::from)
            .map_err(abort(SignState::ReadArtifact))?;

        transition(&scope, SignState::ValidateContentType)?;
        ensure_plain_text(&bytes).map_err(abort(SignState::ValidateContentType))?;

        transition(&scope, SignState::Authenticate)?;
        let token = scope
            .guard(self.authenticate())
            .await
            .map_err(abort(SignState::Authenticate))?;

        transition(&scope, SignState::GenerateKeyPair)?;
        let key_pair = EphemeralKeyPair::generate();
        let public_key = key_pair
            .public_key_spki()
            .map_err(Error::from)
            .map_err(abort(SignState::GenerateKeyPair))?;

        transition(&scope, SignState::ProvePossession)?;
        let proof = key_pair
            .prove_possession(token.challenge().as_bytes())
            .map_err(Error::from)
            .map_err(abort(SignState::ProvePossession))?;

        transition(&scope, SignState::RequestCertificate)?;
        let chain = self
            .request_certificate(&scope, &token, &public_key, &proof)
            .await
            .map_err(abort(SignState::RequestCertificate))?;
        let leaf = inspect_leaf(&chain, &public_key).map_err(abort(SignState::RequestCertificate))?;

        transition(&scope, SignState::SignArtifact)?;
        let digest = sget_crypto::sha256(&bytes);
        let signature = key_pair
            .sign_digest(&digest)
            .map_err(Error::from)
            .map_err(abort(SignState::SignArtifact))?;
        drop(key_pair);

        transition(&scope, SignState::UploadToLog)?;
        let log_entry = scope
            .guard(self.log.upload(&chain.leaf, &signature, &bytes))
            .await
            .map_err(abort(SignState::UploadToLog))?;
        tracing::info!(
            uuid = %log_entry.uuid,
            log_index = log_entry.log_index,
            "signature recorded in transparency log"
        );

        transition(&scope, SignState::PersistMaterials)?;
        let materials = Materials::persist(
            &self.config.store_root,
            id,
            &signature,
            &chain.leaf,
            &log_entry,
        )
        .await
        .map_err(abort(SignState::PersistMaterials))?;

        if let Some((publisher, target)) = &self.publisher {
            transition(&scope, SignState::Publish)?;
            scope
                .guard(publisher.publish(&materials, artifact, target))
                .await
                .map_err(abort(SignState::Publish))?;
        }

        tracing::debug!(state = %SignState::Done, "sign workflow finished");
        Ok(SignOutcome {
            materials,
            digest,
            serial: leaf.serial,
            identity: leaf.identity,
            log_entry,
        })
    }

    async fn authenticate(&self) -> Result<IdentityToken> {
        let token = self.identity.authenticate(&self.config.oidc).await?;
        token.ensure_unexpired()?;
        tracing::info!(issuer = %token.issuer(), subject = %token.challenge(), "authenticated");
        Ok(token)
    }

    /// Ask the authority for a certificate, retrying server-side failures
    async fn request_certificate(
        &self,
        scope: &Scope,
        token: &IdentityToken,
        public_key: &PublicKeySpki,
        proof: &Signature,
    ) -> Result<CertificateChain> {
        let mut attempt = 0;
        loop {
            let result = scope
                .guard(self.authority.request_certificate(token, public_key, proof))
                .await;
            match result {
                Err(e) if e.is_retryable() && attempt < self.config.certificate_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "certificate request failed, retrying");
                    scope.sleep(self.config.retry_backoff).await?;
                }
                other => return other,
            }
        }
    }
}

struct LeafSummary {
    serial: String,
    identity: Option<String>,
}

/// Parse the issued leaf and make sure it certifies our key
fn inspect_leaf(chain: &CertificateChain, public_key: &PublicKeySpki) -> Result<LeafSummary> {
    let rejected = |message: String| Error::CertIssuance {
        status: None,
        retryable: false,
        message,
    };

    let info = sget_crypto::parse_certificate_info(chain.leaf.clone())
        .map_err(|e| rejected(format!("issued certificate is unusable: {}", e)))?;
    if info.public_key != *public_key {
        return Err(rejected(
            "issued certificate does not certify the ephemeral key".to_string(),
        ));
    }

    tracing::info!(
        serial = %info.serial_number,
        identity = info.identity.as_deref().unwrap_or("<none>"),
        "signing certificate issued"
    );
    Ok(LeafSummary {
        serial: info.serial_number,
        identity: info.identity,
    })
}

fn transition(scope: &Scope, state: SignState) -> std::result::Result<(), Aborted<SignState>> {
    tracing::debug!(%state, "sign state");
    scope.check().map_err(abort(state))
}
