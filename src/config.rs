//! Cache-coherence configuration.
//!
//! Controls the default key codec and the bundled memory store.

use std::num::NonZeroUsize;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_KEY_PREVIEW_LIMIT: usize = 24;
const DEFAULT_MEMORY_STORE_LIMIT: usize = 1024;

/// Configuration for a [`CacheContext`](crate::CacheContext).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Run trigger dispatch after mutations.
    pub enable_dispatch: bool,
    /// Maximum characters of the human-legible key preview.
    pub key_preview_limit: usize,
    /// Maximum entries held by a [`MemoryStore`](crate::MemoryStore).
    pub memory_store_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_dispatch: true,
            key_preview_limit: DEFAULT_KEY_PREVIEW_LIMIT,
            memory_store_limit: DEFAULT_MEMORY_STORE_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Returns the memory store limit as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_store_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_store_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enable_dispatch);
        assert_eq!(config.key_preview_limit, 24);
        assert_eq!(config.memory_store_limit, 1024);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_store_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_store_limit_non_zero().get(), 1);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "key_preview_limit": 8 }"#).expect("partial config");
        assert_eq!(config.key_preview_limit, 8);
        assert!(config.enable_dispatch);
        assert_eq!(config.memory_store_limit, 1024);
    }
}
