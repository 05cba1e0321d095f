//! Run-scoped values attached by type.
//!
//! An [`Env`] stashes at most one value per semantic type before the run
//! starts; every handler can retrieve it during execution without the
//! value being threaded through each node's construction. Misuse
//! (attaching a type twice, or reading a type that was never attached)
//! is a configuration bug and aborts rather than degrading.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Heterogeneous bag of run-scoped values, at most one per type.
///
/// Shared read-only across all of a run's node contexts; handlers read
/// it through [`NodeContext::get`](crate::NodeContext::get).
#[derive(Default)]
pub struct Env {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env").field("len", &self.values.len()).finish()
    }
}

impl Env {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `value`, keyed by its type.
    ///
    /// # Panics
    ///
    /// Panics if a value of the same type is already attached.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        let previous = self.values.insert(TypeId::of::<T>(), Box::new(value));
        assert!(
            previous.is_none(),
            "a value of type {} is already attached to this run",
            type_name::<T>()
        );
    }

    /// Fluent form of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Returns the attached value of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if no value of type `T` was attached before the run.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> &T {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .unwrap_or_else(|| {
                panic!("no value of type {} attached to this run", type_name::<T>())
            })
    }
}
