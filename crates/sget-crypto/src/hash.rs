//! Artifact digests
//!
//! Signing and verification both go through [`Sha256Hasher`], so the digest
//! algorithm can never differ between the two sides.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Size of the read buffer used when streaming artifacts
pub const STREAM_CHUNK: usize = 64 * 1024;

/// A SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash([u8; 32]);

impl Sha256Hash {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a hex encoded digest
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::Der(format!("invalid hex digest: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| Error::Der(format!("expected 32-byte digest, got {}", v.len())))?;
        Ok(Self(bytes))
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, as the transparency log expects it
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Hash data using SHA-256
pub fn sha256(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental SHA-256 hasher
#[derive(Clone, Default)]
pub struct Sha256Hasher {
    context: Sha256,
}

impl Sha256Hasher {
    /// Create a new SHA-256 hasher
    pub fn new() -> Self {
        Self {
            context: Sha256::new(),
        }
    }

    /// Update the hasher with data
    pub fn update(&mut self, data: &[u8]) {
        self.context.update(data);
    }

    /// Feed everything `reader` yields into the hasher, one buffer at a time
    pub fn update_reader<R: Read>(&mut self, mut reader: R) -> Result<u64> {
        let mut buf = vec![0u8; STREAM_CHUNK];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.context.update(&buf[..n]);
            total += n as u64;
        }
        Ok(total)
    }

    /// Finalize and get the digest
    pub fn finalize(self) -> Sha256Hash {
        Sha256Hash(self.context.finalize().into())
    }
}

/// Stream a file through SHA-256 without loading it into memory
pub fn sha256_file(path: impl AsRef<Path>) -> Result<Sha256Hash> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut hasher = Sha256Hasher::new();
    let read = hasher.update_reader(std::io::BufReader::new(file))?;
    tracing::trace!(bytes = read, path = %path.as_ref().display(), "hashed artifact");
    Ok(hasher.finalize())
}
