//! Cache store capability contract and the bundled memory backend.
//!
//! The coherence layer only ever needs four primitives from a backend:
//! point read, point write, point delete, and a full key listing. Anything
//! that can provide those (in memory, on disk, behind a network) plugs in
//! through [`CacheStore`].

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lru::LruCache;

use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "store";

// ============================================================================
// Capability contract
// ============================================================================

/// Minimal key/value capability consumed by the coherence layer.
///
/// Keys are opaque strings; values are the serialized text produced by the
/// owning query's value codec. `keys` must return every currently valid key,
/// namespaced or not; filtering to a query's namespace is the caller's job.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// Store resolution
// ============================================================================

/// Resolver from a type-erased call input to a store instance.
pub type StoreResolver =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Arc<dyn CacheStore>> + Send + Sync>;

/// Where an operation's store comes from.
///
/// Either a fixed instance shared by every call, or a resolver applied to
/// the call-time input (query input on the read path, mutation input during
/// trigger dispatch). The latter enables per-tenant or per-request store
/// selection.
#[derive(Clone)]
pub enum StoreSource {
    Fixed(Arc<dyn CacheStore>),
    PerCall(StoreResolver),
}

impl StoreSource {
    pub fn fixed(store: Arc<dyn CacheStore>) -> Self {
        Self::Fixed(store)
    }

    /// Build a per-call source from a resolver over a concrete input type.
    ///
    /// The resolver yields no store when the call input is not a `T`; the
    /// caller treats that as "this operation does not select a store" and
    /// skips the cache interaction.
    pub fn for_input<T, F>(resolver: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Arc<dyn CacheStore> + Send + Sync + 'static,
    {
        Self::PerCall(Arc::new(move |input| {
            input.downcast_ref::<T>().map(&resolver)
        }))
    }

    /// Resolve against a typed call input.
    pub fn resolve<T: Send + Sync + 'static>(&self, input: &T) -> Option<Arc<dyn CacheStore>> {
        match self {
            Self::Fixed(store) => Some(store.clone()),
            Self::PerCall(resolver) => resolver(input),
        }
    }

    /// Resolve against an already-erased call input.
    pub(crate) fn resolve_erased(
        &self,
        input: &(dyn Any + Send + Sync),
    ) -> Option<Arc<dyn CacheStore>> {
        match self {
            Self::Fixed(store) => Some(store.clone()),
            Self::PerCall(resolver) => resolver(input),
        }
    }

    /// The fixed store, if this source is not call-dependent.
    pub(crate) fn as_fixed(&self) -> Option<Arc<dyn CacheStore>> {
        match self {
            Self::Fixed(store) => Some(store.clone()),
            Self::PerCall(_) => None,
        }
    }
}

impl<S: CacheStore + 'static> From<Arc<S>> for StoreSource {
    fn from(store: Arc<S>) -> Self {
        Self::Fixed(store)
    }
}

impl From<Arc<dyn CacheStore>> for StoreSource {
    fn from(store: Arc<dyn CacheStore>) -> Self {
        Self::Fixed(store)
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// In-memory store backed by an LRU map.
///
/// The bundled reference backend: bounded, process-local, no persistence.
/// Reads take the write lock because an LRU `get` bumps recency.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, String>>,
}

impl MemoryStore {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::from_config(&CacheConfig::default())
    }

    /// Create a store sized by the given configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_limit(config.memory_store_limit_non_zero())
    }

    /// Create a store holding at most `limit` entries.
    pub fn with_limit(limit: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(limit)),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(rw_write(&self.entries, SOURCE, "get").get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(rw_read(&self.entries, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();

        assert!(store.get("a").await.expect("get").is_none());

        store.set("a", "1".to_string()).await.expect("set");
        assert_eq!(store.get("a").await.expect("get").as_deref(), Some("1"));

        store.delete("a").await.expect("delete");
        assert!(store.get("a").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn keys_lists_everything() {
        let store = MemoryStore::new();
        store.set("x.1", "a".to_string()).await.expect("set");
        store.set("y.2", "b".to_string()).await.expect("set");

        let mut keys = store.keys().await.expect("keys");
        keys.sort();
        assert_eq!(keys, vec!["x.1".to_string(), "y.2".to_string()]);
    }

    #[tokio::test]
    async fn lru_eviction_respects_limit() {
        let store = MemoryStore::with_limit(NonZeroUsize::new(2).expect("non-zero"));

        store.set("a", "1".to_string()).await.expect("set");
        store.set("b", "2".to_string()).await.expect("set");
        store.set("c", "3".to_string()).await.expect("set");

        assert_eq!(store.len(), 2);
        assert!(store.get("a").await.expect("get").is_none()); // Evicted
        assert!(store.get("b").await.expect("get").is_some());
        assert!(store.get("c").await.expect("get").is_some());
    }

    #[test]
    fn fixed_source_resolves_for_any_input() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let source = StoreSource::fixed(store);

        assert!(source.resolve(&42u32).is_some());
        assert!(source.resolve(&"anything").is_some());
    }

    #[test]
    fn per_call_source_resolves_only_its_input_type() {
        let tenant_a: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let source = StoreSource::for_input(move |_tenant: &String| tenant_a.clone());

        assert!(source.resolve(&"tenant-a".to_string()).is_some());
        assert!(source.resolve(&42u32).is_none());
        assert!(source.as_fixed().is_none());
    }
}
