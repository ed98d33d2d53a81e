use thiserror::Error;

/// Failures raised synchronously while registering a query or mutation.
///
/// Registration either succeeds completely or leaves the context untouched;
/// none of these variants carry partial state.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("explicit name `{explicit}` conflicts with the function's own name `{intrinsic}`")]
    AmbiguousName { intrinsic: String, explicit: String },
    #[error("cannot register an unnamed operation; supply an explicit name")]
    MissingName,
    #[error("query `{name}` is already registered in this context")]
    DuplicateQuery { name: String },
}

impl RegistrationError {
    pub fn ambiguous_name(intrinsic: impl Into<String>, explicit: impl Into<String>) -> Self {
        Self::AmbiguousName {
            intrinsic: intrinsic.into(),
            explicit: explicit.into(),
        }
    }

    pub fn duplicate_query(name: impl Into<String>) -> Self {
        Self::DuplicateQuery { name: name.into() }
    }
}

/// Failure reported by a cache backend.
///
/// The read path treats these as cache misses and the dispatch engine logs
/// and skips the affected key, so a flaky backend degrades throughput, not
/// correctness.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Key or value (de)serialization failure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("codec failed: {message}")]
    Other { message: String },
}

impl CodecError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
