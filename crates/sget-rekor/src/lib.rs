//! Rekor transparency log client
//!
//! Records signatures in the public transparency log as `hashedrekord`
//! entries and returns the durable reference to each one.

pub mod client;
pub mod entry;
pub mod error;

pub use client::RekorClient;
pub use entry::{HashedRekord, LogEntry};
pub use error::{Error, Result};
