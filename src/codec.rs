//! Cached-value (de)serialization.
//!
//! Values are stored as text. The default round-trip is JSON via
//! `serde_json`; queries may override either direction with their own
//! closures.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Encodes a query output into its stored text form.
pub type Encode<O> = Arc<dyn Fn(&O) -> Result<String, CodecError> + Send + Sync>;

/// Decodes a stored text form back into a query output.
pub type Decode<O> = Arc<dyn Fn(&str) -> Result<O, CodecError> + Send + Sync>;

/// The default encoder: JSON text.
pub fn json_encode<O: Serialize>() -> Encode<O> {
    Arc::new(|value| serde_json::to_string(value).map_err(CodecError::from))
}

/// The default decoder: JSON text.
pub fn json_decode<O: DeserializeOwned>() -> Decode<O> {
    Arc::new(|raw| serde_json::from_str(raw).map_err(CodecError::from))
}
