//! Registration context.
//!
//! The single source of truth for what queries and mutations exist in one
//! cache scope and how they relate. Written only while registering; read by
//! trigger dispatch. Applications construct contexts explicitly (there is
//! no hidden global) and may hold several independent ones.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::RegistrationError;
use crate::lock::{rw_read, rw_write};
use crate::trigger::{ErasedTriggerFn, StoredTrigger};

const SOURCE: &str = "context";

/// A registered query: its name plus the triggers attached so far.
///
/// Owned exclusively by the context; trigger lists grow in place via
/// `add_trigger` and nothing is ever removed.
pub(crate) struct QueryRegistration {
    pub(crate) name: String,
    pub(crate) invalidated_by: Vec<StoredTrigger>,
    pub(crate) updated_by: Vec<StoredTrigger>,
}

impl QueryRegistration {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invalidated_by: Vec::new(),
            updated_by: Vec::new(),
        }
    }
}

/// Which of a registration's trigger lists to append to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TriggerList {
    Invalidation,
    Update,
}

/// Shared registry of queries and mutations for one cache scope.
pub struct CacheContext {
    config: CacheConfig,
    queries: RwLock<HashMap<String, QueryRegistration>>,
    mutations: RwLock<HashSet<String>>,
}

impl CacheContext {
    /// Create a context with default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(CacheConfig::default())
    }

    /// Create a context with the given configuration.
    pub fn with_config(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            queries: RwLock::new(HashMap::new()),
            mutations: RwLock::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of registered queries.
    pub fn query_count(&self) -> usize {
        rw_read(&self.queries, SOURCE, "query_count").len()
    }

    pub fn has_query(&self, name: &str) -> bool {
        rw_read(&self.queries, SOURCE, "has_query").contains_key(name)
    }

    pub fn has_mutation(&self, name: &str) -> bool {
        rw_read(&self.mutations, SOURCE, "has_mutation").contains(name)
    }

    /// Insert a new query registration.
    ///
    /// Insert-if-absent under the write lock: with two concurrent
    /// registrations of one name, exactly one wins and the loser observes
    /// the duplicate error with the table unchanged.
    pub(crate) fn register_query(
        &self,
        registration: QueryRegistration,
    ) -> Result<(), RegistrationError> {
        let mut queries = rw_write(&self.queries, SOURCE, "register_query");
        match queries.entry(registration.name.clone()) {
            Entry::Occupied(_) => Err(RegistrationError::duplicate_query(registration.name)),
            Entry::Vacant(slot) => {
                debug!(query = %registration.name, "Query registered");
                slot.insert(registration);
                Ok(())
            }
        }
    }

    /// Record a mutation name. Idempotent; only existence is tracked.
    pub(crate) fn register_mutation(&self, name: &str) {
        let mut mutations = rw_write(&self.mutations, SOURCE, "register_mutation");
        if mutations.insert(name.to_string()) {
            debug!(mutation = %name, "Mutation registered");
        }
    }

    /// Append a stored trigger to a registered query.
    pub(crate) fn append_trigger(&self, query_name: &str, list: TriggerList, trigger: StoredTrigger) {
        let mut queries = rw_write(&self.queries, SOURCE, "append_trigger");
        let Some(registration) = queries.get_mut(query_name) else {
            // Handles only exist for registered queries; a miss here means
            // the handle outlived its context's registration, which cannot
            // happen through the public API.
            warn!(query = %query_name, "Trigger attached to unknown query; dropped");
            return;
        };
        debug!(
            query = %query_name,
            mutation = %trigger.mutation,
            list = ?list,
            "Trigger attached"
        );
        match list {
            TriggerList::Invalidation => registration.invalidated_by.push(trigger),
            TriggerList::Update => registration.updated_by.push(trigger),
        }
    }

    /// Clone out every trigger body matching the mutation name.
    ///
    /// The `Arc`s are cloned under the read lock and the guard dropped
    /// before any of them is awaited; a query's invalidation triggers come
    /// before its update triggers, with no ordering across queries.
    pub(crate) fn matching_triggers(&self, mutation_name: &str) -> Vec<ErasedTriggerFn> {
        let queries = rw_read(&self.queries, SOURCE, "matching_triggers");
        let mut matches = Vec::new();
        for registration in queries.values() {
            for trigger in registration
                .invalidated_by
                .iter()
                .chain(registration.updated_by.iter())
            {
                if trigger.mutation == mutation_name {
                    matches.push(trigger.run.clone());
                }
            }
        }
        matches
    }
}
