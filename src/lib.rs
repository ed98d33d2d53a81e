//! Riflesso cache-coherence layer.
//!
//! Keeps cached query results consistent with the mutations that touch the
//! same remote state:
//!
//! - **Queries** are read operations wrapped with cache-aside caching, each
//!   owning a key namespace inside a shared store.
//! - **Mutations** are write operations whose every execution, resolved or
//!   rejected, dispatches the registered triggers.
//! - **Triggers** bind a mutation to an effect on one query's cache:
//!   invalidate affected entries, or rewrite them in place without
//!   recomputation.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let context = CacheContext::new();
//!
//! let get_recipes = CachedQuery::register(&context, get_recipes, QueryOptions::new(store))?;
//! let add_recipe = Mutation::register(&context, add_recipe, MutationOptions::new())?;
//!
//! get_recipes.add_trigger(Trigger::invalidated_by(&add_recipe, |recipe, _, _, keys| {
//!     Affected::keys(keys.to_vec())
//! }));
//!
//! // Executing the mutation now sweeps the affected cached searches.
//! add_recipe.execute(recipe).await?;
//! ```

mod codec;
mod config;
mod context;
mod dispatch;
mod error;
mod extend;
mod keys;
mod lock;
mod mutation;
mod naming;
mod query;
mod store;
mod trigger;

pub use codec::{Decode, Encode, json_decode, json_encode};
pub use config::CacheConfig;
pub use context::CacheContext;
pub use error::{CodecError, RegistrationError, StoreError};
pub use extend::ExtendedCache;
pub use keys::{KeySerializer, default_key, namespace_key, namespace_prefix};
pub use mutation::{Mutation, MutationOptions};
pub use query::{CachedQuery, QueryOptions};
pub use store::{CacheStore, MemoryStore, StoreResolver, StoreSource};
pub use trigger::{
    Affected, AffectsFn, InvalidationRule, MutationStatus, Trigger, UpdateFn, UpdateRule,
};
