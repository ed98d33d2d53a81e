//! Trigger dispatch engine.
//!
//! Runs once per mutation execution, resolved or rejected. Collects every
//! registered trigger matching the mutation by name, launches them together,
//! and awaits them as one group; within a trigger, the affected keys are
//! invalidated or rewritten concurrently with no ordering guarantee.
//!
//! Failures are isolated per trigger: a store error under one trigger is
//! logged and skips only that work, never the rest of the dispatch, and
//! never the mutation's own result.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use crate::context::CacheContext;
use crate::extend::ExtendedCache;
use crate::keys;
use crate::store::CacheStore;
use crate::trigger::{AffectsFn, MutationStatus, UpdateFn};

const METRIC_DISPATCH_MS: &str = "riflesso_dispatch_ms";
const METRIC_INVALIDATED_KEYS: &str = "riflesso_invalidated_keys_total";
const METRIC_UPDATED_KEYS: &str = "riflesso_updated_keys_total";

/// Type-erased record of one mutation execution.
///
/// Triggers were declared against concrete mutation types; the shims stored
/// with each trigger downcast these back at dispatch time.
pub(crate) struct MutationEnvelope {
    pub(crate) name: String,
    pub(crate) input: Arc<dyn Any + Send + Sync>,
    pub(crate) output: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) status: MutationStatus,
}

impl MutationEnvelope {
    pub(crate) fn resolved<I, O>(name: &str, input: I, output: O) -> Self
    where
        I: Send + Sync + 'static,
        O: Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            input: Arc::new(input),
            output: Some(Arc::new(output)),
            status: MutationStatus::Resolved,
        }
    }

    pub(crate) fn rejected<I>(name: &str, input: I) -> Self
    where
        I: Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            input: Arc::new(input),
            output: None,
            status: MutationStatus::Rejected,
        }
    }
}

/// Run every trigger matching the mutation, concurrently.
#[instrument(skip_all, fields(mutation = %envelope.name))]
pub(crate) async fn dispatch(context: &CacheContext, envelope: MutationEnvelope) {
    if !context.config().enable_dispatch {
        debug!("Trigger dispatch skipped: disabled by configuration");
        return;
    }

    let triggers = context.matching_triggers(&envelope.name);
    if triggers.is_empty() {
        debug!("No triggers match this mutation");
        return;
    }

    let started = Instant::now();
    debug!(
        trigger_count = triggers.len(),
        status = ?envelope.status,
        "Trigger dispatch starting"
    );

    let envelope = Arc::new(envelope);
    join_all(triggers.into_iter().map(|run| run(envelope.clone()))).await;

    histogram!(METRIC_DISPATCH_MS).record(started.elapsed().as_secs_f64() * 1000.0);
    debug!("Trigger dispatch complete");
}

/// One invalidation trigger's pass: resolve the store, compute the affected
/// keys, and delete them concurrently.
pub(crate) async fn run_invalidation<I, O, E, MIn, MOut>(
    cache: &ExtendedCache<I, O, E>,
    query_name: &str,
    affects: &AffectsFn<I, MIn, MOut>,
    envelope: Arc<MutationEnvelope>,
) where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
    MIn: Send + Sync + 'static,
    MOut: Send + Sync + 'static,
{
    let Some((input, output)) = downcast_envelope::<MIn, MOut>(query_name, &envelope) else {
        return;
    };
    let Some(store) = resolve_store(cache, query_name, &envelope) else {
        return;
    };
    let Some(targets) = affected_keys(
        cache,
        query_name,
        affects,
        input,
        output,
        envelope.status,
        store.as_ref(),
    )
    .await
    else {
        return;
    };
    if targets.is_empty() {
        return;
    }

    let store = store.as_ref();
    join_all(targets.iter().map(|key| async move {
        if let Err(error) = store.delete(key).await {
            warn!(query = query_name, key = %key, error = %error, "Invalidation delete failed");
        }
    }))
    .await;

    counter!(METRIC_INVALIDATED_KEYS).increment(targets.len() as u64);
    debug!(
        query = query_name,
        mutation = %envelope.name,
        keys = targets.len(),
        "Invalidation trigger applied"
    );
}

/// One update trigger's pass: resolve the store, compute the affected keys,
/// and rewrite each currently cached value concurrently.
///
/// A key with no valid cached entry is skipped without invoking the user's
/// transform; an already-invalidated entry never masquerades as present.
pub(crate) async fn run_update<I, O, E, MIn, MOut>(
    cache: &ExtendedCache<I, O, E>,
    query_name: &str,
    affects: &AffectsFn<I, MIn, MOut>,
    update: &UpdateFn<O, MIn, MOut>,
    envelope: Arc<MutationEnvelope>,
) where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
    MIn: Send + Sync + 'static,
    MOut: Send + Sync + 'static,
{
    let Some((input, output)) = downcast_envelope::<MIn, MOut>(query_name, &envelope) else {
        return;
    };
    let Some(store) = resolve_store(cache, query_name, &envelope) else {
        return;
    };
    let Some(targets) = affected_keys(
        cache,
        query_name,
        affects,
        input,
        output,
        envelope.status,
        store.as_ref(),
    )
    .await
    else {
        return;
    };
    if targets.is_empty() {
        return;
    }

    let status = envelope.status;
    let store = store.as_ref();
    let outcomes = join_all(targets.iter().map(|key| async move {
        cache
            .update_key_with(store, key, |current| update(current, input, output, status))
            .await
    }))
    .await;

    let applied = outcomes.into_iter().filter(|applied| *applied).count();
    counter!(METRIC_UPDATED_KEYS).increment(applied as u64);
    debug!(
        query = query_name,
        mutation = %envelope.name,
        keys = targets.len(),
        applied,
        "Update trigger applied"
    );
}

fn downcast_envelope<'e, MIn: 'static, MOut: 'static>(
    query_name: &str,
    envelope: &'e MutationEnvelope,
) -> Option<(&'e MIn, Option<&'e MOut>)> {
    let Some(input) = envelope.input.downcast_ref::<MIn>() else {
        warn!(
            query = query_name,
            mutation = %envelope.name,
            "Mutation input type does not match this trigger; trigger skipped"
        );
        return None;
    };
    let output = match &envelope.output {
        Some(output) => match output.downcast_ref::<MOut>() {
            Some(output) => Some(output),
            None => {
                warn!(
                    query = query_name,
                    mutation = %envelope.name,
                    "Mutation output type does not match this trigger; trigger skipped"
                );
                return None;
            }
        },
        None => None,
    };
    Some((input, output))
}

fn resolve_store<I, O, E>(
    cache: &ExtendedCache<I, O, E>,
    query_name: &str,
    envelope: &MutationEnvelope,
) -> Option<Arc<dyn CacheStore>>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
{
    let store = cache.store_source().resolve_erased(envelope.input.as_ref());
    if store.is_none() {
        warn!(
            query = query_name,
            mutation = %envelope.name,
            "No store resolved from mutation input; trigger skipped"
        );
    }
    store
}

/// List the store's keys, filter them to the query's namespace, hand them to
/// the trigger's `affects` function, and union the declared keys with the
/// keys derived from the declared inputs.
async fn affected_keys<I, O, E, MIn, MOut>(
    cache: &ExtendedCache<I, O, E>,
    query_name: &str,
    affects: &AffectsFn<I, MIn, MOut>,
    input: &MIn,
    output: Option<&MOut>,
    status: MutationStatus,
    store: &dyn CacheStore,
) -> Option<HashSet<String>>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
    E: Send + 'static,
{
    let listed = match store.keys().await {
        Ok(listed) => listed,
        Err(error) => {
            warn!(query = query_name, error = %error, "Key listing failed; trigger skipped");
            return None;
        }
    };
    let prefix = keys::namespace_prefix(query_name);
    let cached: Vec<String> = listed
        .into_iter()
        .filter(|key| key.starts_with(&prefix))
        .collect();

    let affected = affects(input, output, status, &cached);

    let mut targets: HashSet<String> = affected.keys.into_iter().collect();
    for query_input in &affected.inputs {
        match cache.key_for(query_input) {
            Ok(key) => {
                targets.insert(key);
            }
            Err(error) => {
                warn!(query = query_name, error = %error, "Affected input failed to serialize; skipped");
            }
        }
    }
    Some(targets)
}
