//! Content type check applied before any network traffic
//!
//! Only plain-text UTF-8 scripts may be signed. The check is deterministic:
//! the same bytes are always accepted or always rejected.

use crate::error::{Error, Result};

/// Control bytes tolerated in a text script
fn is_allowed_control(byte: u8) -> bool {
    matches!(byte, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)
}

/// Reject anything that is not non-empty plain UTF-8 text
pub fn ensure_plain_text(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::UnsupportedArtifactType(
            "artifact is empty".to_string(),
        ));
    }

    let text = std::str::from_utf8(bytes).map_err(|e| {
        Error::UnsupportedArtifactType(format!(
            "artifact is not UTF-8 text (invalid byte at offset {})",
            e.valid_up_to()
        ))
    })?;

    if let Some(offset) = text
        .bytes()
        .position(|b| (b < 0x20 && !is_allowed_control(b)) || b == 0x7f)
    {
        return Err(Error::UnsupportedArtifactType(format!(
            "artifact contains binary data at offset {}",
            offset
        )));
    }

    Ok(())
}
