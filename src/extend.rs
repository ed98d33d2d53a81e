//! Extendable caching wrapper.
//!
//! Wraps a raw async callable with cache-aside read-through and exposes the
//! side-channel primitives (`invalidate`, `update`) the coherence layer
//! drives from trigger dispatch.
//!
//! The cache never breaks the read path: a key that fails to serialize, a
//! store that fails to read, or a cached value that fails to decode all
//! degrade to computing the value fresh; a store that fails to write still
//! returns the computed value.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::codec::{Decode, Encode};
use crate::error::CodecError;
use crate::keys::KeySerializer;
use crate::store::{CacheStore, StoreSource};

/// Stored form of a raw query or mutation callable.
pub(crate) type RawFn<I, O, E> =
    Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

pub(crate) fn box_raw_fn<F, Fut, I, O, E>(logic: F) -> RawFn<I, O, E>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<O, E>> + Send + 'static,
{
    Arc::new(move |input: I| Box::pin(logic(input)) as BoxFuture<'static, Result<O, E>>)
}

/// A raw callable wrapped with cache-aside behavior.
///
/// `execute` reads through the resolved store; the remaining operations are
/// the side channel used by callers and by trigger dispatch to invalidate or
/// rewrite entries without recomputation.
pub struct ExtendedCache<I, O, E> {
    logic: RawFn<I, O, E>,
    store: StoreSource,
    key_fn: KeySerializer<I>,
    encode: Encode<O>,
    decode: Decode<O>,
}

impl<I, O, E> Clone for ExtendedCache<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            logic: self.logic.clone(),
            store: self.store.clone(),
            key_fn: self.key_fn.clone(),
            encode: self.encode.clone(),
            decode: self.decode.clone(),
        }
    }
}

impl<I, O, E> ExtendedCache<I, O, E>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
{
    pub fn new(
        logic: RawFn<I, O, E>,
        store: StoreSource,
        key_fn: KeySerializer<I>,
        encode: Encode<O>,
        decode: Decode<O>,
    ) -> Self {
        Self {
            logic,
            store,
            key_fn,
            encode,
            decode,
        }
    }

    /// The storage key an input maps to.
    pub fn key_for(&self, input: &I) -> Result<String, CodecError> {
        (self.key_fn)(input)
    }

    pub(crate) fn store_source(&self) -> &StoreSource {
        &self.store
    }

    /// Cache-aside read: serve the cached value if present and decodable,
    /// otherwise invoke the raw logic and cache its output.
    ///
    /// Errors from the raw logic propagate unchanged; cache trouble only
    /// ever costs a recomputation.
    pub async fn execute(&self, input: I) -> Result<O, E> {
        let key = match (self.key_fn)(&input) {
            Ok(key) => key,
            Err(error) => {
                warn!(error = %error, "Key serialization failed; bypassing cache for this call");
                return (self.logic)(input).await;
            }
        };

        let Some(store) = self.store.resolve(&input) else {
            warn!(key = %key, "No store resolved for input; bypassing cache for this call");
            return (self.logic)(input).await;
        };

        match store.get(&key).await {
            Ok(Some(raw)) => match (self.decode)(&raw) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(key = %key, error = %error, "Cached value failed to decode; recomputing");
                }
            },
            Ok(None) => {}
            Err(error) => {
                warn!(key = %key, error = %error, "Cache read failed; recomputing");
            }
        }

        let output = (self.logic)(input).await?;

        match (self.encode)(&output) {
            Ok(encoded) => {
                if let Err(error) = store.set(&key, encoded).await {
                    warn!(key = %key, error = %error, "Cache write failed; value not cached");
                }
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Output failed to encode; value not cached");
            }
        }

        Ok(output)
    }

    /// Drop the cached entry for an input.
    pub async fn invalidate(&self, input: &I) {
        let key = match (self.key_fn)(input) {
            Ok(key) => key,
            Err(error) => {
                warn!(error = %error, "Key serialization failed; nothing invalidated");
                return;
            }
        };
        let Some(store) = self.store.resolve(input) else {
            warn!(key = %key, "No store resolved for input; nothing invalidated");
            return;
        };
        if let Err(error) = store.delete(&key).await {
            warn!(key = %key, error = %error, "Invalidation delete failed");
        }
    }

    /// Drop the cached entry at an exact storage key.
    ///
    /// Requires a fixed store: with per-call resolution there is no input to
    /// resolve against outside of dispatch.
    pub async fn invalidate_key(&self, key: &str) {
        let Some(store) = self.store.as_fixed() else {
            warn!(key = %key, "invalidate_key needs a fixed store; nothing invalidated");
            return;
        };
        if let Err(error) = store.delete(key).await {
            warn!(key = %key, error = %error, "Invalidation delete failed");
        }
    }

    /// Replace the cached value for an input.
    pub async fn update(&self, input: &I, value: &O) {
        let key = match (self.key_fn)(input) {
            Ok(key) => key,
            Err(error) => {
                warn!(error = %error, "Key serialization failed; nothing updated");
                return;
            }
        };
        let Some(store) = self.store.resolve(input) else {
            warn!(key = %key, "No store resolved for input; nothing updated");
            return;
        };
        self.write_value(store.as_ref(), &key, value).await;
    }

    /// Replace the cached value at an exact storage key.
    ///
    /// Requires a fixed store, like [`ExtendedCache::invalidate_key`].
    pub async fn update_key(&self, key: &str, value: &O) {
        let Some(store) = self.store.as_fixed() else {
            warn!(key = %key, "update_key needs a fixed store; nothing updated");
            return;
        };
        self.write_value(store.as_ref(), key, value).await;
    }

    /// Transform the currently cached value at `key`, writing the result
    /// back. Returns whether the transform was applied.
    ///
    /// A miss, an unreadable entry, or an undecodable entry skips the
    /// transform entirely; the caller's closure is never handed a value
    /// that was not actually cached.
    pub(crate) async fn update_key_with<F>(
        &self,
        store: &dyn CacheStore,
        key: &str,
        transform: F,
    ) -> bool
    where
        F: FnOnce(O) -> O,
    {
        let raw = match store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(error) => {
                warn!(key = %key, error = %error, "Cache read failed; update skipped");
                return false;
            }
        };
        let current = match (self.decode)(&raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(key = %key, error = %error, "Cached value failed to decode; update skipped");
                return false;
            }
        };
        let next = transform(current);
        let encoded = match (self.encode)(&next) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(key = %key, error = %error, "Updated value failed to encode; update skipped");
                return false;
            }
        };
        if let Err(error) = store.set(key, encoded).await {
            warn!(key = %key, error = %error, "Update write failed");
            return false;
        }
        true
    }

    async fn write_value(&self, store: &dyn CacheStore, key: &str, value: &O) {
        match (self.encode)(value) {
            Ok(encoded) => {
                if let Err(error) = store.set(key, encoded).await {
                    warn!(key = %key, error = %error, "Update write failed");
                }
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Value failed to encode; nothing updated");
            }
        }
    }
}
