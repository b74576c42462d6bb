//! Handler dispatch.
//!
//! Each task's handler is called exactly once with the task's ordered values.
//! [`invoke_concurrent`] forks one scoped thread per task and joins them all
//! before returning.

use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::collector::Task;
use crate::context::Context;
use crate::error::{CombineError, HandlerError, Result};
use crate::handler::ResultMap;

/// Call the task's handler once with all of its values.
pub(crate) fn invoke(task: &Task, context: &Context) -> Result<ResultMap> {
    tracing::trace!(
        "Dispatching {} value(s) to handler '{}'",
        task.values.len(),
        task.name
    );

    let result = task
        .handler
        .handle(&task.values, context)
        .map_err(|source| CombineError::Handler {
            name: task.name.clone(),
            source,
        })?;

    if result.len() > task.values.len() {
        tracing::warn!(
            "Handler '{}' returned {} result(s) for {} value(s)",
            task.name,
            result.len(),
            task.values.len()
        );
    }

    Ok(result)
}

/// Results of a concurrent dispatch.
pub(crate) struct ConcurrentOutcome {
    /// Per task, in task order; `None` where the handler failed.
    pub results: Vec<Option<ResultMap>>,
    /// First failure in completion order. Later failures are dropped.
    pub first_error: Option<CombineError>,
}

/// Run every task's handler on its own thread and wait for all of them.
pub(crate) fn invoke_concurrent(tasks: &[Task], context: &Context) -> ConcurrentOutcome {
    let first_error: Mutex<Option<CombineError>> = Mutex::new(None);

    let results: Vec<Option<ResultMap>> = thread::scope(|scope| {
        let workers: Vec<_> = tasks
            .iter()
            .map(|task| {
                let first_error = &first_error;
                scope.spawn(move || match invoke(task, context) {
                    Ok(result) => Some(result),
                    Err(err) => {
                        record_first(first_error, err);
                        None
                    }
                })
            })
            .collect();

        workers
            .into_iter()
            .zip(tasks)
            .map(|(worker, task)| {
                worker.join().unwrap_or_else(|_| {
                    record_first(
                        &first_error,
                        CombineError::Handler {
                            name: task.name.clone(),
                            source: HandlerError::new("handler panicked"),
                        },
                    );
                    None
                })
            })
            .collect()
    });

    ConcurrentOutcome {
        results,
        first_error: first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner),
    }
}

fn record_first(slot: &Mutex<Option<CombineError>>, err: CombineError) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(err);
    } else {
        tracing::debug!("Dropping additional handler error: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::TaskEntry;
    use crate::directive::OutputTarget;
    use crate::handler::AggregateHandler;
    use crate::value::FieldValue;
    use std::sync::Arc;

    fn task<H: AggregateHandler + 'static>(name: &str, values: Vec<FieldValue>, handler: H) -> Task {
        let entries = values
            .iter()
            .enumerate()
            .map(|(record, value)| TaskEntry {
                record,
                field_index: 0,
                field_name: "Value",
                value: value.clone(),
                output: OutputTarget::SameField,
            })
            .collect();
        Task {
            name: name.to_string(),
            handler: Arc::new(handler),
            entries,
            values,
        }
    }

    fn doubler(values: &[FieldValue], _ctx: &Context) -> std::result::Result<ResultMap, HandlerError> {
        Ok(values
            .iter()
            .map(|v| v.as_i64().unwrap_or_default() * 2)
            .enumerate()
            .collect())
    }

    fn failing(_values: &[FieldValue], _ctx: &Context) -> std::result::Result<ResultMap, HandlerError> {
        Err(HandlerError::new("boom"))
    }

    fn panicking(_values: &[FieldValue], _ctx: &Context) -> std::result::Result<ResultMap, HandlerError> {
        panic!("handler bug");
    }

    #[test]
    fn test_invoke_passes_values_and_context() {
        let ctx = Context::builder().set("factor", 3).build();
        let t = task(
            "scale",
            vec![FieldValue::Int(1), FieldValue::Int(2)],
            |values: &[FieldValue], ctx: &Context| -> std::result::Result<ResultMap, HandlerError> {
                let factor = ctx.get_i64("factor").unwrap_or(1);
                Ok(values
                    .iter()
                    .map(|v| v.as_i64().unwrap_or_default() * factor)
                    .enumerate()
                    .collect())
            },
        );

        let result = invoke(&t, &ctx).unwrap();
        assert_eq!(result.get_position(1), Some(&FieldValue::Int(6)));
    }

    #[test]
    fn test_invoke_wraps_handler_error() {
        let t = task("bad", vec![FieldValue::Null], failing);
        let err = invoke(&t, &Context::empty()).unwrap_err();
        assert!(matches!(err, CombineError::Handler { ref name, .. } if name == "bad"));
        assert_eq!(err.to_string(), "handler bad failed: boom");
    }

    #[test]
    fn test_concurrent_keeps_task_order() {
        let tasks = vec![
            task("a", vec![FieldValue::Int(1)], doubler),
            task("b", vec![FieldValue::Int(5), FieldValue::Int(7)], doubler),
        ];

        let outcome = invoke_concurrent(&tasks, &Context::empty());
        assert!(outcome.first_error.is_none());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(
            outcome.results[1].as_ref().unwrap().get_position(1),
            Some(&FieldValue::Int(14))
        );
    }

    #[test]
    fn test_concurrent_reports_one_error() {
        let tasks = vec![
            task("ok", vec![FieldValue::Int(1)], doubler),
            task("bad1", vec![FieldValue::Int(1)], failing),
            task("bad2", vec![FieldValue::Int(1)], failing),
        ];

        let outcome = invoke_concurrent(&tasks, &Context::empty());
        assert!(outcome.results[0].is_some());
        assert!(outcome.results[1].is_none());
        assert!(outcome.results[2].is_none());
        assert!(matches!(
            outcome.first_error,
            Some(CombineError::Handler { ref name, .. }) if name == "bad1" || name == "bad2"
        ));
    }

    #[test]
    fn test_concurrent_turns_panic_into_error() {
        let tasks = vec![
            task("ok", vec![FieldValue::Int(1)], doubler),
            task("panics", vec![FieldValue::Int(1)], panicking),
        ];

        let outcome = invoke_concurrent(&tasks, &Context::empty());
        assert!(outcome.results[0].is_some());
        assert!(matches!(
            outcome.first_error,
            Some(CombineError::Handler { ref name, .. }) if name == "panics"
        ));
    }
}
