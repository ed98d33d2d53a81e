//! Query registration.
//!
//! Wraps a raw read operation with namespaced caching, stores the
//! registration in the context, and hands back the typed handle callers use
//! to execute the query and attach triggers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{self, Decode, Encode};
use crate::context::{CacheContext, QueryRegistration, TriggerList};
use crate::dispatch;
use crate::error::{CodecError, RegistrationError};
use crate::extend::{ExtendedCache, box_raw_fn};
use crate::keys::{self, KeySerializer};
use crate::naming;
use crate::store::StoreSource;
use crate::trigger::{ErasedTriggerFn, StoredTrigger, Trigger, TriggerFuture};

/// Options for registering a query.
pub struct QueryOptions<I, O> {
    name: Option<String>,
    store: StoreSource,
    key_fn: Option<KeySerializer<I>>,
    encode: Option<Encode<O>>,
    decode: Option<Decode<O>>,
}

impl<I, O> QueryOptions<I, O> {
    pub fn new(store: impl Into<StoreSource>) -> Self {
        Self {
            name: None,
            store: store.into(),
            key_fn: None,
            encode: None,
            decode: None,
        }
    }

    /// Register under an explicit name instead of the function's own.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the default key serializer.
    ///
    /// The query's namespace prefix is applied on top of whatever this
    /// returns.
    pub fn key_serializer<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&I) -> Result<String, CodecError> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Override the default JSON value encoder.
    pub fn encode_with<F>(mut self, encode: F) -> Self
    where
        F: Fn(&O) -> Result<String, CodecError> + Send + Sync + 'static,
    {
        self.encode = Some(Arc::new(encode));
        self
    }

    /// Override the default JSON value decoder.
    pub fn decode_with<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str) -> Result<O, CodecError> + Send + Sync + 'static,
    {
        self.decode = Some(Arc::new(decode));
        self
    }
}

/// Handle to a registered, cache-wrapped query.
pub struct CachedQuery<I, O, E> {
    name: String,
    context: Arc<CacheContext>,
    cache: ExtendedCache<I, O, E>,
}

impl<I, O, E> Clone for CachedQuery<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            context: self.context.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<I, O, E> fmt::Debug for CachedQuery<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedQuery")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<I, O, E> CachedQuery<I, O, E>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespaced storage key an input maps to.
    pub fn key_for(&self, input: &I) -> Result<String, CodecError> {
        self.cache.key_for(input)
    }

    /// Cache-aside read: cached value if present, raw logic otherwise.
    pub async fn execute(&self, input: I) -> Result<O, E> {
        self.cache.execute(input).await
    }

    /// Drop the cached entry for an input.
    pub async fn invalidate(&self, input: &I) {
        self.cache.invalidate(input).await;
    }

    /// Drop the cached entry at an exact namespaced key.
    pub async fn invalidate_key(&self, key: &str) {
        self.cache.invalidate_key(key).await;
    }

    /// Replace the cached value for an input.
    pub async fn update(&self, input: &I, value: &O) {
        self.cache.update(input, value).await;
    }

    /// Replace the cached value at an exact namespaced key.
    pub async fn update_key(&self, key: &str, value: &O) {
        self.cache.update_key(key, value).await;
    }

    /// Attach a trigger binding a registered mutation to this query's cache.
    ///
    /// Declared here rather than at registration because the mutation is a
    /// separately registered value: this is the one call boundary where the
    /// query's and the mutation's concrete types are both in scope, so the
    /// shim stored on the registration captures them precisely.
    pub fn add_trigger<MIn, MOut>(&self, trigger: Trigger<I, O, MIn, MOut>)
    where
        MIn: Send + Sync + 'static,
        MOut: Send + Sync + 'static,
    {
        match trigger {
            Trigger::InvalidatedBy(rule) => {
                let cache = self.cache.clone();
                let query_name = self.name.clone();
                let affects = rule.affects;
                let run: ErasedTriggerFn = Arc::new(move |envelope| {
                    let cache = cache.clone();
                    let query_name = query_name.clone();
                    let affects = affects.clone();
                    Box::pin(async move {
                        dispatch::run_invalidation(&cache, &query_name, &affects, envelope).await;
                    }) as TriggerFuture
                });
                self.context.append_trigger(
                    &self.name,
                    TriggerList::Invalidation,
                    StoredTrigger {
                        mutation: rule.mutation,
                        run,
                    },
                );
            }
            Trigger::UpdatedBy(rule) => {
                let cache = self.cache.clone();
                let query_name = self.name.clone();
                let affects = rule.affects;
                let update = rule.update;
                let run: ErasedTriggerFn = Arc::new(move |envelope| {
                    let cache = cache.clone();
                    let query_name = query_name.clone();
                    let affects = affects.clone();
                    let update = update.clone();
                    Box::pin(async move {
                        dispatch::run_update(&cache, &query_name, &affects, &update, envelope)
                            .await;
                    }) as TriggerFuture
                });
                self.context.append_trigger(
                    &self.name,
                    TriggerList::Update,
                    StoredTrigger {
                        mutation: rule.mutation,
                        run,
                    },
                );
            }
        }
    }
}

impl<I, O, E> CachedQuery<I, O, E>
where
    I: Serialize + Send + Sync + 'static,
    O: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Register a raw query into the context, wrapped with caching.
    ///
    /// Resolves the name, namespaces the key serializer under it, registers
    /// the record, and returns the handle. A naming conflict or duplicate
    /// name aborts with the context unchanged.
    pub fn register<F, Fut>(
        context: &Arc<CacheContext>,
        logic: F,
        options: QueryOptions<I, O>,
    ) -> Result<Self, RegistrationError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let name = naming::resolve_name::<F>(options.name.as_deref())?;

        let base_key: KeySerializer<I> = options.key_fn.unwrap_or_else(|| {
            let limit = context.config().key_preview_limit;
            Arc::new(move |input: &I| keys::default_key(input, limit))
        });
        let namespaced: KeySerializer<I> = {
            let name = name.clone();
            Arc::new(move |input: &I| {
                base_key(input).map(|key| keys::namespace_key(&name, &key))
            })
        };
        let encode = options.encode.unwrap_or_else(codec::json_encode);
        let decode = options.decode.unwrap_or_else(codec::json_decode);

        context.register_query(QueryRegistration::new(name.clone()))?;

        Ok(Self {
            name,
            context: context.clone(),
            cache: ExtendedCache::new(box_raw_fn(logic), options.store, namespaced, encode, decode),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::mutation::{Mutation, MutationOptions};
    use crate::store::MemoryStore;
    use crate::trigger::Affected;

    async fn get_recipes(search_for: String) -> Result<Vec<String>, String> {
        Ok(vec![format!("{search_for} tartare")])
    }

    fn memory_options<I, O>() -> QueryOptions<I, O> {
        QueryOptions::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn registers_under_intrinsic_name_and_namespaces_keys() {
        let context = CacheContext::new();
        let query = CachedQuery::register(&context, get_recipes, memory_options())
            .expect("registration");

        assert_eq!(query.name(), "get_recipes");
        assert!(context.has_query("get_recipes"));

        let key = query.key_for(&"steak".to_string()).expect("key");
        assert!(key.starts_with("get_recipes."));
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let context = CacheContext::new();
        CachedQuery::register(&context, get_recipes, memory_options())
            .expect("first registration");
        let error = CachedQuery::register(&context, get_recipes, memory_options())
            .expect_err("duplicate");

        assert!(matches!(error, RegistrationError::DuplicateQuery { .. }));
        assert_eq!(context.query_count(), 1);
    }

    #[tokio::test]
    async fn execute_caches_per_input() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = CacheContext::new();
        let query = {
            let calls = calls.clone();
            CachedQuery::register(
                &context,
                move |search_for: String| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, String>(vec![format!("{search_for} tartare")]) }
                },
                memory_options().named("get_recipes"),
            )
            .expect("registration")
        };

        let first = query.execute("steak".to_string()).await.expect("execute");
        let second = query.execute("steak".to_string()).await.expect("execute");
        query.execute("smoothie".to_string()).await.expect("execute");

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn custom_key_serializer_is_namespaced() {
        let context = CacheContext::new();
        let query = CachedQuery::register(
            &context,
            get_recipes,
            memory_options().key_serializer(|input: &String| Ok(input.clone())),
        )
        .expect("registration");

        let key = query.key_for(&"steak".to_string()).expect("key");
        assert_eq!(key, "get_recipes.steak");
    }

    #[tokio::test]
    async fn add_trigger_appends_to_the_registration() {
        let context = CacheContext::new();
        let query = CachedQuery::register(&context, get_recipes, memory_options())
            .expect("query registration");
        let mutation = Mutation::register(
            &context,
            |title: String| async move { Ok::<_, String>(title) },
            MutationOptions::new().named("add_recipe"),
        )
        .expect("mutation registration");

        let trigger = Trigger::invalidated_by(&mutation, |_title, _out, _status, keys| {
            Affected::keys(keys.to_vec())
        });
        assert_eq!(trigger.mutation_name(), "add_recipe");
        query.add_trigger(trigger);

        assert_eq!(context.matching_triggers("add_recipe").len(), 1);
    }

    #[tokio::test]
    async fn by_key_side_channel_operates_on_exact_keys() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = CacheContext::new();
        let query = {
            let calls = calls.clone();
            CachedQuery::register(
                &context,
                move |search_for: String| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, String>(vec![format!("{search_for} tartare")]) }
                },
                memory_options().named("get_recipes"),
            )
            .expect("registration")
        };

        query.execute("steak".to_string()).await.expect("execute");
        let key = query.key_for(&"steak".to_string()).expect("key");

        query
            .update_key(&key, &vec!["steak wellington".to_string()])
            .await;
        let updated = query.execute("steak".to_string()).await.expect("execute");
        assert_eq!(updated, vec!["steak wellington".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        query.invalidate_key(&key).await;
        query.execute("steak".to_string()).await.expect("execute");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
