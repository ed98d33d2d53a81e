//! Mutation registration.
//!
//! A registered mutation wraps its raw write logic so that every execution,
//! successful or failed, feeds trigger dispatch before the result is handed
//! back to the caller unchanged.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::CacheContext;
use crate::dispatch::{self, MutationEnvelope};
use crate::error::RegistrationError;
use crate::extend::{RawFn, box_raw_fn};
use crate::naming;

/// Options for registering a mutation.
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    name: Option<String>,
}

impl MutationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under an explicit name instead of the function's own.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Handle to a registered mutation.
pub struct Mutation<I, O, E> {
    name: String,
    context: Arc<CacheContext>,
    logic: RawFn<I, O, E>,
}

impl<I, O, E> Clone for Mutation<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            context: self.context.clone(),
            logic: self.logic.clone(),
        }
    }
}

impl<I, O, E> fmt::Debug for Mutation<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<I, O, E> Mutation<I, O, E> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I, O, E> Mutation<I, O, E>
where
    I: Clone + Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Run the raw mutation logic, then dispatch triggers.
    ///
    /// Dispatch runs whether the logic resolved or rejected: a remote write
    /// may have partially applied before failing, and rules may exist
    /// precisely for that case. The original result is returned unchanged
    /// after dispatch completes; dispatch never swallows or wraps it.
    pub async fn execute(&self, input: I) -> Result<O, E> {
        let result = (self.logic)(input.clone()).await;

        let envelope = match &result {
            Ok(output) => MutationEnvelope::resolved(&self.name, input, output.clone()),
            Err(_) => MutationEnvelope::rejected(&self.name, input),
        };
        dispatch::dispatch(&self.context, envelope).await;

        result
    }

    /// Register a raw mutation into the context.
    ///
    /// The name is resolved from the function's own identity or the explicit
    /// override in `options`; an ambiguous or missing name aborts the
    /// registration with no side effects.
    pub fn register<F, Fut>(
        context: &Arc<CacheContext>,
        logic: F,
        options: MutationOptions,
    ) -> Result<Self, RegistrationError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let name = naming::resolve_name::<F>(options.name.as_deref())?;
        context.register_mutation(&name);

        Ok(Self {
            name,
            context: context.clone(),
            logic: box_raw_fn(logic),
        })
    }
}
