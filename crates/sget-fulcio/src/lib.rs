//! Fulcio certificate authority client
//!
//! Exchanges an identity token, a public key, and a proof of possession for
//! a short-lived signing certificate chain.

pub mod client;
pub mod error;

pub use client::{CertificateChain, FulcioClient, SigningCertificateRequest};
pub use error::{Error, Result};
