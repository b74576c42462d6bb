//! Handler registry for aggregate functions.
//!
//! Maps function names used in field directives to [`AggregateHandler`]
//! implementations. Lookups take a shared lock and registration an exclusive
//! one, so handlers can be registered while a `process` call is in flight.

use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::error::{CombineError, Result};
use crate::handler::AggregateHandler;

/// Registry for storing and looking up aggregate handlers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<IndexMap<String, Arc<dyn AggregateHandler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl HandlerRegistry {
    /// Create a new empty handler registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an aggregate handler, replacing any previous one.
    ///
    /// Returns `true` when an existing handler with the same name was replaced.
    ///
    /// # Example
    ///
    /// ```
    /// use combine::{Context, FieldValue, HandlerError, HandlerRegistry, ResultMap};
    ///
    /// let registry = HandlerRegistry::new();
    /// registry.register("uppercase", |values: &[FieldValue], _ctx: &Context| {
    ///     Ok::<_, HandlerError>(
    ///         values.iter().map(|v| v.to_string().to_uppercase()).enumerate().collect::<ResultMap>(),
    ///     )
    /// });
    /// assert!(registry.contains("uppercase"));
    /// ```
    pub fn register<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: AggregateHandler + 'static,
    {
        self.register_arc(name, Arc::new(handler))
    }

    /// Register a shared handler, replacing any previous one.
    pub fn register_arc(&self, name: impl Into<String>, handler: Arc<dyn AggregateHandler>) -> bool {
        let name = name.into();
        tracing::debug!("Registering aggregate handler '{}'", name);
        self.handlers
            .write()
            .expect("handler registry lock poisoned")
            .insert(name, handler)
            .is_some()
    }

    /// Register a handler that may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`CombineError::MissingHandler`] when `handler` is `None`.
    pub fn register_optional(
        &self,
        name: impl Into<String>,
        handler: Option<Arc<dyn AggregateHandler>>,
    ) -> Result<bool> {
        let name = name.into();
        match handler {
            Some(handler) => Ok(self.register_arc(name, handler)),
            None => Err(CombineError::MissingHandler { name }),
        }
    }

    /// Look up a handler by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn AggregateHandler>> {
        self.handlers
            .read()
            .expect("handler registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Check if a handler is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers
            .read()
            .expect("handler registry lock poisoned")
            .contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.handlers
            .read()
            .expect("handler registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .expect("handler registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
