//! Shortcode decoding.
//!
//! Shortcodes are the platform's URL-safe base64 encoding of the numeric
//! media key, most significant character first. Codes longer than eleven
//! characters are private-share codes whose tail is noise; only the first
//! eleven characters carry the key.

use super::{ClientError, MediaKey};

/// URL-safe base64 alphabet used by the platform.
const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Maximum number of shortcode characters that encode the key.
const KEY_CHARS: usize = 11;

/// Decodes a shortcode into the opaque internal media key.
///
/// # Errors
///
/// Returns [`ClientError::BadShortcode`] for empty codes or codes with
/// characters outside the URL-safe base64 alphabet.
pub fn media_key_from_shortcode(code: &str) -> Result<MediaKey, ClientError> {
    let significant: String = code.chars().take(KEY_CHARS).collect();
    if significant.is_empty() {
        return Err(ClientError::BadShortcode {
            code: code.to_string(),
        });
    }

    let mut key: u64 = 0;
    for ch in significant.bytes() {
        let index = ALPHABET.iter().position(|&c| c == ch).ok_or_else(|| {
            ClientError::BadShortcode {
                code: code.to_string(),
            }
        })?;
        key = (key << 6) | index as u64;
    }

    Ok(MediaKey(key))
}
