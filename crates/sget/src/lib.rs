//! Keyless signing and verified execution of distributed scripts
//!
//! [`SignWorkflow`] signs a script with a short-lived certificate and records
//! the signature in a transparency log. [`VerifyWorkflow`] fetches a released
//! script with its certificate and signature, verifies it, and only then
//! runs it.

pub mod config;
pub mod content;
pub mod error;
pub mod exec;
pub mod identity;
pub mod materials;
pub mod publish;
pub mod release;
pub mod scope;
pub mod services;
pub mod sign;
pub mod verify;

// Re-export core crates
pub use sget_crypto as crypto;
pub use sget_fulcio as fulcio;
pub use sget_oidc as oidc;
pub use sget_rekor as rekor;

pub use config::{OidcConfig, SignConfig, VerifyConfig, DEFAULT_STORE_ROOT};
pub use error::{
    Aborted, Error, Result, Stage, EXIT_CANCELLED, EXIT_EXECUTION, EXIT_FAILURE, EXIT_REJECTED,
};
pub use exec::{exit_code, Executor, Verified};
pub use identity::{
    select_provider, AmbientProvider, DeviceFlowProvider, IdentityProvider, StaticTokenProvider,
};
pub use materials::{Materials, MaterialsId};
pub use publish::{ManifestPublisher, PublishTarget, Publisher};
pub use release::{
    GithubReleaseSource, ReleaseAsset, ReleaseAssets, ReleaseCoordinates, ReleaseSource,
};
pub use scope::Scope;
pub use services::{
    BoxFuture, CertificateAuthority, FulcioAuthority, RekorLog, TransparencyLog,
};
pub use sign::{SignOutcome, SignState, SignWorkflow};
pub use verify::{verify_materials, LocalMaterials, VerifiedRelease, VerifyState, VerifyWorkflow};
