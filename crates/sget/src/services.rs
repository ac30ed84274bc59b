//! Seams to the certificate authority and the transparency log
//!
//! Workflows only see these traits, so tests can drive them with
//! in-process fakes. [`FulcioAuthority`] and [`RekorLog`] are the network
//! implementations.

use crate::error::Result;
use sget_crypto::{CertificateDer, PublicKeySpki, Signature};
use sget_fulcio::{CertificateChain, FulcioClient};
use sget_oidc::IdentityToken;
use sget_rekor::{HashedRekord, LogEntry, RekorClient};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the service traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Issues short-lived signing certificates
pub trait CertificateAuthority: Send + Sync {
    /// Exchange an identity token, public key and proof of possession for a
    /// certificate chain, leaf first
    fn request_certificate<'a>(
        &'a self,
        token: &'a IdentityToken,
        public_key: &'a PublicKeySpki,
        proof: &'a Signature,
    ) -> BoxFuture<'a, Result<CertificateChain>>;
}

/// Records signing events in an append-only log
pub trait TransparencyLog: Send + Sync {
    /// Submit the certificate, signature and artifact; return the entry reference
    fn upload<'a>(
        &'a self,
        certificate: &'a CertificateDer,
        signature: &'a Signature,
        artifact: &'a [u8],
    ) -> BoxFuture<'a, Result<LogEntry>>;
}

/// Certificate authority backed by a Fulcio instance
pub struct FulcioAuthority {
    client: FulcioClient,
}

impl FulcioAuthority {
    /// Wrap a Fulcio client
    pub fn new(client: FulcioClient) -> Self {
        Self { client }
    }
}

impl CertificateAuthority for FulcioAuthority {
    fn request_certificate<'a>(
        &'a self,
        token: &'a IdentityToken,
        public_key: &'a PublicKeySpki,
        proof: &'a Signature,
    ) -> BoxFuture<'a, Result<CertificateChain>> {
        Box::pin(async move {
            let chain = self
                .client
                .create_signing_certificate(token.raw(), public_key, proof)
                .await?;
            Ok(chain)
        })
    }
}

/// Transparency log backed by a Rekor instance
pub struct RekorLog {
    client: RekorClient,
}

impl RekorLog {
    /// Wrap a Rekor client
    pub fn new(client: RekorClient) -> Self {
        Self { client }
    }
}

impl TransparencyLog for RekorLog {
    fn upload<'a>(
        &'a self,
        certificate: &'a CertificateDer,
        signature: &'a Signature,
        artifact: &'a [u8],
    ) -> BoxFuture<'a, Result<LogEntry>> {
        Box::pin(async move {
            let digest = sget_crypto::sha256(artifact);
            let entry = HashedRekord::new(&digest, signature, certificate);
            let created = self.client.create_entry(entry).await?;
            tracing::debug!(url = %self.client.entry_url(&created.uuid), "log entry created");
            Ok(created)
        })
    }
}
