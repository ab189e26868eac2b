//! Type tag validation.
//!
//! Tags appear verbatim in both stream encodings, so they must be non-empty,
//! at most `u16::MAX` bytes long, and free of control characters.

use crate::error::{RefError, RefResult};

/// Longest tag the binary encoding can carry.
pub const MAX_TAG_LEN: usize = u16::MAX as usize;

/// Validate a type tag, returning `Ok(())` if it can be registered.
pub fn validate_type_tag(tag: &str) -> RefResult<()> {
    let invalid = |reason: &str| RefError::InvalidTag {
        tag: tag.to_string(),
        reason: reason.to_string(),
    };

    if tag.is_empty() {
        return Err(invalid("tag must not be empty"));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(invalid("tag is longer than 65535 bytes"));
    }
    if let Some(ch) = tag.chars().find(|c| c.is_control()) {
        return Err(invalid(&format!("contains control character {ch:?}")));
    }
    Ok(())
}
