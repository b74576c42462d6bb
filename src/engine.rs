//! The batch aggregation engine.

use std::any::Any;
use std::sync::Arc;

use crate::binder;
use crate::collector::{self, Collected};
use crate::config::CombineConfig;
use crate::context::Context;
use crate::dispatcher;
use crate::error::{CombineError, Result};
use crate::handler::AggregateHandler;
use crate::record::{Record, RecordRegistry};
use crate::registry::HandlerRegistry;

/// Batch aggregation engine.
///
/// Holds the handler registry, the record type table and the shared context.
/// Registration takes `&self`, so a `Combine` can sit behind an `Arc` and
/// accept registrations while other threads are processing batches.
///
/// # Example
///
/// ```
/// use combine::{Combine, Context, FieldValue, HandlerError, Record, ResultMap, Schema};
///
/// #[derive(Default)]
/// struct User {
///     name: String,
/// }
///
/// impl Record for User {
///     fn schema() -> Schema<Self> {
///         Schema::new("User").tagged_field("Name", "uppercase", |u: &User| &u.name, |u: &mut User| &mut u.name)
///     }
/// }
///
/// let engine = Combine::default();
/// engine.register("uppercase", |values: &[FieldValue], _ctx: &Context| {
///     Ok::<_, HandlerError>(values.iter().map(|v| v.to_string().to_uppercase()).enumerate().collect::<ResultMap>())
/// });
///
/// let mut users = vec![User { name: "alice".into() }, User { name: "bob".into() }];
/// engine.process_records(&mut users).unwrap();
/// assert_eq!(users[1].name, "BOB");
/// ```
#[derive(Debug, Default)]
pub struct Combine {
    concurrent: bool,
    context: Context,
    handlers: HandlerRegistry,
    records: RecordRegistry,
}

impl Combine {
    pub fn new(config: CombineConfig) -> Self {
        Self {
            concurrent: config.concurrent,
            context: config.context,
            handlers: HandlerRegistry::new(),
            records: RecordRegistry::new(),
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Register an aggregate handler under `name`, replacing any previous one.
    ///
    /// Returns `true` when a handler was replaced.
    pub fn register<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: AggregateHandler + 'static,
    {
        self.handlers.register(name, handler)
    }

    /// Register a shared handler; see [`Combine::register`].
    pub fn register_arc(&self, name: impl Into<String>, handler: Arc<dyn AggregateHandler>) -> bool {
        self.handlers.register_arc(name, handler)
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
        self.handlers.register_optional(name, handler)
    }

    /// Install the capability table for record type `R`.
    ///
    /// Required before `R` (or `Box<R>`) values appear in a [`Combine::process`]
    /// batch. [`Combine::process_records`] does this on demand.
    pub fn register_record<R: Record>(&self) {
        self.records.register::<R>();
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains(name)
    }

    /// Registered handler names in registration order.
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.names()
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Process a batch of records in place.
    ///
    /// Every element must be a registered record type or a `Box` of one.
    /// Fields carrying directives are grouped by function name, each handler
    /// is called once with all of its values, and results are written back.
    ///
    /// # Errors
    ///
    /// Collection errors ([`CombineError::InvalidItem`],
    /// [`CombineError::UnregisteredHandler`]) are raised before any handler
    /// runs, so nothing has been written. Handler and write-back errors may
    /// leave some writes applied.
    pub fn process(&self, batch: &mut [&mut dyn Any]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let collected = collector::collect(batch, &self.records, &self.handlers)?;
        tracing::debug!(
            "Processing {} record(s) across {} task(s) ({})",
            batch.len(),
            collected.tasks.len(),
            if self.concurrent { "concurrent" } else { "sequential" }
        );

        let outcome = if self.concurrent {
            self.run_concurrent(&collected, batch)
        } else {
            self.run_sequential(&collected, batch)
        };

        match &outcome {
            Ok(()) => tracing::debug!("Processed {} record(s)", batch.len()),
            Err(err) => tracing::debug!("Batch processing failed: {}", err),
        }
        outcome
    }

    /// Process a homogeneous slice of records, registering `R` if needed.
    pub fn process_records<R: Record>(&self, records: &mut [R]) -> Result<()> {
        self.records.ensure::<R>();
        let mut batch: Vec<&mut dyn Any> = records
            .iter_mut()
            .map(|record| record as &mut dyn Any)
            .collect();
        self.process(&mut batch)
    }

    fn run_sequential(&self, collected: &Collected, batch: &mut [&mut dyn Any]) -> Result<()> {
        for task in &collected.tasks {
            let result = dispatcher::invoke(task, &self.context)?;
            binder::bind(task, &result, batch, &collected.access)?;
        }
        Ok(())
    }

    fn run_concurrent(&self, collected: &Collected, batch: &mut [&mut dyn Any]) -> Result<()> {
        let outcome = dispatcher::invoke_concurrent(&collected.tasks, &self.context);

        // Tasks own disjoint fields, so applying them in task order after the
        // join yields the same record state as any interleaving.
        let mut bind_error: Option<CombineError> = None;
        for (task, result) in collected.tasks.iter().zip(&outcome.results) {
            let Some(result) = result else { continue };
            if let Err(err) = binder::bind(task, result, batch, &collected.access) {
                if bind_error.is_none() {
                    bind_error = Some(err);
                }
            }
        }

        match outcome.first_error.or(bind_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::ResultMap;
    use crate::record::Schema;
    use crate::value::FieldValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Pair {
        a: i64,
        b: i64,
    }

    impl Record for Pair {
        fn schema() -> Schema<Self> {
            Schema::new("Pair")
                .tagged_field("A", "agg1,A", |p: &Pair| &p.a, |p: &mut Pair| &mut p.a)
                .tagged_field("B", "agg2,B", |p: &Pair| &p.b, |p: &mut Pair| &mut p.b)
        }
    }

    fn constant(value: i64) -> impl AggregateHandler {
        move |values: &[FieldValue], _ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
            Ok((0..values.len()).map(|i| (i, value)).collect())
        }
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let engine = Combine::default();
        let mut batch: [&mut dyn Any; 0] = [];
        assert!(engine.process(&mut batch).is_ok());
    }

    #[test]
    fn test_sequential_and_concurrent_agree() {
        for concurrent in [false, true] {
            let engine = Combine::new(CombineConfig::default().with_concurrent(concurrent));
            engine.register("agg1", constant(1));
            engine.register("agg2", constant(2));

            let mut items = vec![Pair::default(); 3];
            engine.process_records(&mut items).unwrap();
            assert!(items.iter().all(|p| *p == Pair { a: 1, b: 2 }), "{:?}", items);
        }
    }

    #[test]
    fn test_each_handler_called_once_per_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Combine::default();

        let counter = Arc::clone(&calls);
        engine.register(
            "agg1",
            move |values: &[FieldValue], _ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(values.len(), 4);
                Ok(ResultMap::new())
            },
        );
        engine.register("agg2", constant(0));

        let mut items = vec![Pair::default(); 4];
        engine.process_records(&mut items).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequential_stops_at_first_handler_error() {
        let engine = Combine::default();
        engine.register(
            "agg1",
            |_values: &[FieldValue], _ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                Err(HandlerError::new("agg1 down"))
            },
        );
        engine.register("agg2", constant(2));

        let mut items = vec![Pair::default(); 2];
        let err = engine.process_records(&mut items).unwrap_err();
        assert!(matches!(err, CombineError::Handler { ref name, .. } if name == "agg1"));
        // agg2 was never dispatched
        assert!(items.iter().all(|p| p.b == 0));
    }

    #[test]
    fn test_concurrent_applies_successful_tasks_despite_error() {
        let engine = Combine::new(CombineConfig::default().with_concurrent(true));
        engine.register(
            "agg1",
            |_values: &[FieldValue], _ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                Err(HandlerError::new("agg1 down"))
            },
        );
        engine.register("agg2", constant(2));

        let mut items = vec![Pair::default(); 2];
        let err = engine.process_records(&mut items).unwrap_err();
        assert!(matches!(err, CombineError::Handler { .. }));
        assert!(items.iter().all(|p| p.b == 2));
    }

    #[test]
    fn test_handlers_see_engine_context() {
        let engine = Combine::new(
            CombineConfig::default().with_context(Context::builder().set("base", 40).build()),
        );
        engine.register(
            "agg1",
            |values: &[FieldValue], ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                let base = ctx
                    .get_i64("base")
                    .ok_or_else(|| HandlerError::new("missing base"))?;
                Ok((0..values.len()).map(|i| (i, base + i as i64)).collect())
            },
        );
        engine.register("agg2", constant(0));

        let mut items = vec![Pair::default(); 2];
        engine.process_records(&mut items).unwrap();
        assert_eq!(items[0].a, 40);
        assert_eq!(items[1].a, 41);
    }

    #[test]
    fn test_register_record_then_process_dyn_batch() {
        let engine = Combine::default();
        engine.register_record::<Pair>();
        engine.register("agg1", constant(5));
        engine.register("agg2", constant(6));

        let mut plain = Pair::default();
        let mut boxed = Box::new(Pair::default());
        let mut batch: [&mut dyn Any; 2] = [&mut plain, &mut boxed];
        engine.process(&mut batch).unwrap();

        assert_eq!(plain, Pair { a: 5, b: 6 });
        assert_eq!(*boxed, Pair { a: 5, b: 6 });
    }

    #[test]
    fn test_concurrent_single_task_panic_is_handler_error() {
        #[derive(Debug, Default)]
        struct Single {
            v: i64,
        }

        impl Record for Single {
            fn schema() -> Schema<Self> {
                Schema::new("Single").tagged_field("V", "boom", |s: &Single| &s.v, |s: &mut Single| &mut s.v)
            }
        }

        let engine = Combine::new(CombineConfig::default().with_concurrent(true));
        engine.register(
            "boom",
            |_values: &[FieldValue], _ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                panic!("boom handler bug");
            },
        );

        let mut items = vec![Single { v: 3 }];
        let err = engine.process_records(&mut items).unwrap_err();
        assert!(matches!(
            err,
            CombineError::Handler { ref name, ref source } if name == "boom" && source.message() == "handler panicked"
        ));
        assert_eq!(items[0].v, 3);
    }

    #[test]
    fn test_accessors_reflect_config() {
        let engine = Combine::new(
            CombineConfig::default()
                .with_concurrent(true)
                .with_context(Context::builder().set("env", "prod").build()),
        );
        engine.register("agg1", constant(1));

        assert!(engine.is_concurrent());
        assert_eq!(engine.context().get_str("env"), Some("prod"));
        assert!(engine.handlers().contains("agg1"));
        assert_eq!(engine.handlers().len(), 1);
        assert!(!Combine::default().is_concurrent());
    }
}
