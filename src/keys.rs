//! Cache key derivation and per-query namespacing.
//!
//! Every cached entry lives under its query's namespace so that distinct
//! queries sharing one store never collide and invalidation sweeps can
//! filter a full key listing down to one query by prefix.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// Serializes a query input into its (un-namespaced) storage key.
pub type KeySerializer<I> = Arc<dyn Fn(&I) -> Result<String, CodecError> + Send + Sync>;

/// Derive the default storage key for an input.
///
/// The key is a human-legible preview (alphanumeric characters of the
/// JSON-serialized input, truncated to `preview_limit`) joined with a
/// SHA-256 hex digest of the same serialized bytes by a `.`. The preview
/// makes keys readable in store listings; the digest guarantees uniqueness.
pub fn default_key<I: Serialize>(input: &I, preview_limit: usize) -> Result<String, CodecError> {
    let serialized = serde_json::to_string(input)?;
    let preview: String = serialized
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(preview_limit)
        .collect();
    let digest = Sha256::digest(serialized.as_bytes());
    Ok(format!("{preview}.{}", hex::encode(digest)))
}

/// The prefix every key of the named query starts with.
///
/// Includes the trailing `.` so that `recipes` never matches keys of a
/// query named `recipes_admin`.
pub fn namespace_prefix(name: &str) -> String {
    format!("{name}.")
}

/// Place a derived key under the named query's namespace.
pub fn namespace_key(name: &str, key: &str) -> String {
    format!("{name}.{key}")
}
