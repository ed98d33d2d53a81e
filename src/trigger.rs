//! Trigger data model.
//!
//! A trigger binds one registered mutation to an effect on one query's
//! cache: either dropping affected entries (`InvalidatedBy`) or rewriting
//! them in place (`UpdatedBy`). Triggers are declared with both operations'
//! concrete types in scope, then stored type-erased on the query's
//! registration record.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::dispatch::MutationEnvelope;
use crate::mutation::Mutation;

/// How a mutation's raw logic settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// The logic returned a value.
    Resolved,
    /// The logic returned an error. Dispatch still runs: a remote write may
    /// have partially applied before failing.
    Rejected,
}

impl MutationStatus {
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }
}

/// The cached entries a trigger declares affected.
///
/// `keys` are full namespaced storage keys (as seen in the listing handed to
/// the `affects` function) and are honored verbatim; `inputs` are query
/// inputs re-serialized through the query's key function. Both sets are
/// processed as a union, not either/or.
pub struct Affected<I> {
    pub keys: Vec<String>,
    pub inputs: Vec<I>,
}

impl<I> Default for Affected<I> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            inputs: Vec::new(),
        }
    }
}

impl<I> Affected<I> {
    /// Nothing affected.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn keys<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            inputs: Vec::new(),
        }
    }

    pub fn inputs(inputs: impl IntoIterator<Item = I>) -> Self {
        Self {
            keys: Vec::new(),
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn and_keys<K: Into<String>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn and_inputs(mut self, inputs: impl IntoIterator<Item = I>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.inputs.is_empty()
    }
}

/// Computes the affected entries from a mutation execution and the query's
/// current key listing.
pub type AffectsFn<QIn, MIn, MOut> = Arc<
    dyn Fn(&MIn, Option<&MOut>, MutationStatus, &[String]) -> Affected<QIn> + Send + Sync,
>;

/// Computes the replacement value for one cached entry.
pub type UpdateFn<QOut, MIn, MOut> =
    Arc<dyn Fn(QOut, &MIn, Option<&MOut>, MutationStatus) -> QOut + Send + Sync>;

/// An invalidation rule: when the named mutation runs, drop what `affects`
/// declares.
pub struct InvalidationRule<QIn, MIn, MOut> {
    pub(crate) mutation: String,
    pub(crate) affects: AffectsFn<QIn, MIn, MOut>,
}

/// An update rule: when the named mutation runs, rewrite what `affects`
/// declares through `update`.
pub struct UpdateRule<QIn, QOut, MIn, MOut> {
    pub(crate) mutation: String,
    pub(crate) affects: AffectsFn<QIn, MIn, MOut>,
    pub(crate) update: UpdateFn<QOut, MIn, MOut>,
}

/// A trigger to attach to a query.
///
/// Exactly one effect per trigger; the two-armed enum makes supplying zero
/// or both impossible at the type level.
pub enum Trigger<QIn, QOut, MIn, MOut> {
    InvalidatedBy(InvalidationRule<QIn, MIn, MOut>),
    UpdatedBy(UpdateRule<QIn, QOut, MIn, MOut>),
}

impl<QIn, QOut, MIn, MOut> Trigger<QIn, QOut, MIn, MOut> {
    /// Declare that `mutation` invalidates the entries `affects` names.
    pub fn invalidated_by<ME, F>(mutation: &Mutation<MIn, MOut, ME>, affects: F) -> Self
    where
        F: Fn(&MIn, Option<&MOut>, MutationStatus, &[String]) -> Affected<QIn>
            + Send
            + Sync
            + 'static,
    {
        Self::InvalidatedBy(InvalidationRule {
            mutation: mutation.name().to_string(),
            affects: Arc::new(affects),
        })
    }

    /// Declare that `mutation` rewrites the entries `affects` names,
    /// computing each replacement value with `update`.
    pub fn updated_by<ME, F, U>(mutation: &Mutation<MIn, MOut, ME>, affects: F, update: U) -> Self
    where
        F: Fn(&MIn, Option<&MOut>, MutationStatus, &[String]) -> Affected<QIn>
            + Send
            + Sync
            + 'static,
        U: Fn(QOut, &MIn, Option<&MOut>, MutationStatus) -> QOut + Send + Sync + 'static,
    {
        Self::UpdatedBy(UpdateRule {
            mutation: mutation.name().to_string(),
            affects: Arc::new(affects),
            update: Arc::new(update),
        })
    }

    /// The mutation this trigger matches on.
    pub fn mutation_name(&self) -> &str {
        match self {
            Self::InvalidatedBy(rule) => &rule.mutation,
            Self::UpdatedBy(rule) => &rule.mutation,
        }
    }
}

// ============================================================================
// Stored (type-erased) form
// ============================================================================

pub(crate) type TriggerFuture = BoxFuture<'static, ()>;

/// An erased trigger body: everything typed was captured at `add_trigger`.
pub(crate) type ErasedTriggerFn =
    Arc<dyn Fn(Arc<MutationEnvelope>) -> TriggerFuture + Send + Sync>;

/// A trigger as held by a query's registration record.
pub(crate) struct StoredTrigger {
    pub(crate) mutation: String,
    pub(crate) run: ErasedTriggerFn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affected_union_builders() {
        let affected: Affected<String> = Affected::keys(["recipes.a"])
            .and_inputs(["smoothie".to_string()])
            .and_keys(["recipes.b"]);

        assert_eq!(affected.keys, vec!["recipes.a", "recipes.b"]);
        assert_eq!(affected.inputs, vec!["smoothie".to_string()]);
        assert!(!affected.is_empty());
        assert!(Affected::<String>::none().is_empty());
    }

    #[test]
    fn status_resolution() {
        assert!(MutationStatus::Resolved.is_resolved());
        assert!(!MutationStatus::Rejected.is_resolved());
    }
}
