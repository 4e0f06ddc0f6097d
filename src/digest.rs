//! Cache key derivation for document URLs.
//!
//! The cached copy of a document lives under `cache/<sha256-of-url>.html`, which
//! keeps file names fixed-length and filesystem-safe whatever the URL looks like.

use sha2::{Digest, Sha256};

/// Suffix appended to every cache file name
pub const CACHE_SUFFIX: &str = ".html";

/// Compute the lowercase hex SHA-256 digest of arbitrary bytes.
pub fn hex_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Cache file name for a document URL (`<64 hex chars>.html`).
pub fn cache_file_name(url: &str) -> String {
    format!("{}{CACHE_SUFFIX}", hex_digest(url.as_bytes()))
}
