//! Decoding images embedded in the page as `data:` URIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use exn::{OptionExt, ResultExt};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Decodes a `data:image/...;base64,<payload>` reference into raw bytes.
///
/// Everything up to the first comma is metadata and is discarded. The payload
/// is percent-decoded first (Telegram escapes it for transport), then base64
/// decoded with the standard, padded alphabet. Line breaks, raw or escaped,
/// are skipped. A literal `+` is kept as-is: it belongs to the base64
/// alphabet and is not an escaped space.
///
/// Nothing is assumed about the decoded bytes beyond what the URI claims.
///
/// ```rust
/// use tgimg_extract::decode_inline;
/// let svg = decode_inline("data:image/svg+xml;base64,PHN2Zz48L3N2Zz4%3D").unwrap();
/// assert_eq!(svg, b"<svg></svg>");
/// ```
#[instrument(level = "debug", skip(reference), fields(reference_size = reference.len()))]
pub fn decode_inline(reference: &str) -> Result<Vec<u8>> {
    let (_metadata, payload) = reference.split_once(',').ok_or_raise(|| ErrorKind::InvalidDataUri)?;
    let mut unescaped = percent_decode(payload)?;
    // Wrapped payloads are common; line breaks are never part of the data.
    unescaped.retain(|byte| !matches!(byte, b'\r' | b'\n'));
    let bytes = BASE64.decode(&unescaped).or_raise(|| ErrorKind::Base64)?;
    tracing::debug!(decoded_size = bytes.len(), "Inline image decoded");
    Ok(bytes)
}

/// Strict percent-decoding: every `%` must introduce two hex digits.
fn percent_decode(payload: &str) -> Result<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut position = 0;
    while let Some(offset) = bytes[position..].iter().position(|b| *b == b'%') {
        let start = position + offset;
        match bytes.get(start + 1..start + 3) {
            Some([high, low]) if high.is_ascii_hexdigit() && low.is_ascii_hexdigit() => position = start + 3,
            _ => exn::bail!(ErrorKind::PercentEncoding { position: start }),
        }
    }
    Ok(urlencoding::decode_binary(bytes).into_owned())
}
