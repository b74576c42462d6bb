//! Batch collection.
//!
//! Walks a batch in order, reads every field that carries a directive and
//! groups the occurrences into one [`Task`] per function name, preserving
//! discovery order both across and within tasks.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::directive::OutputTarget;
use crate::error::{CombineError, Result};
use crate::handler::AggregateHandler;
use crate::record::{RecordAccess, RecordRegistry};
use crate::registry::HandlerRegistry;
use crate::value::FieldValue;

/// One field occurrence feeding a task.
#[derive(Debug, Clone)]
pub(crate) struct TaskEntry {
    /// Position of the record in the batch.
    pub record: usize,
    /// Declaration position of the source field.
    pub field_index: usize,
    pub field_name: &'static str,
    /// Field value at collection time; also the by-value lookup key.
    pub value: FieldValue,
    pub output: OutputTarget,
}

/// All occurrences of one function name across a batch.
pub(crate) struct Task {
    pub name: String,
    pub handler: Arc<dyn AggregateHandler>,
    pub entries: Vec<TaskEntry>,
    /// Values submitted to the handler, parallel to `entries`.
    pub values: Vec<FieldValue>,
}

impl Task {
    fn new(name: String, handler: Arc<dyn AggregateHandler>) -> Self {
        Self {
            name,
            handler,
            entries: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, entry: TaskEntry) {
        self.values.push(entry.value.clone());
        self.entries.push(entry);
    }
}

/// Output of the collection pass.
pub(crate) struct Collected {
    /// Tasks in order of first discovery.
    pub tasks: Vec<Task>,
    /// Capability table for each batch element, by position.
    pub access: Vec<Arc<dyn RecordAccess>>,
}

/// Group the batch's directive-carrying fields by function name.
///
/// # Errors
///
/// * [`CombineError::InvalidItem`] - an element is not a registered record type
/// * [`CombineError::UnregisteredHandler`] - a directive names an unknown function
///
/// Both abort the walk at the offending element; nothing has been written yet.
pub(crate) fn collect(
    batch: &[&mut dyn Any],
    records: &RecordRegistry,
    handlers: &HandlerRegistry,
) -> Result<Collected> {
    let mut tasks: IndexMap<String, Task> = IndexMap::new();
    let mut access = Vec::with_capacity(batch.len());

    for (index, slot) in batch.iter().enumerate() {
        let item: &dyn Any = &**slot;
        let record = records
            .resolve(item)
            .ok_or(CombineError::InvalidItem { index })?;

        for field in record.tagged_fields() {
            let function = &field.directive.function;

            if !tasks.contains_key(function) {
                let handler = handlers
                    .lookup(function)
                    .ok_or_else(|| CombineError::UnregisteredHandler {
                        name: function.clone(),
                    })?;
                tasks.insert(function.clone(), Task::new(function.clone(), handler));
            }

            let value = record.read(item, field.index).unwrap_or_default();
            if let Some(task) = tasks.get_mut(function) {
                task.push(TaskEntry {
                    record: index,
                    field_index: field.index,
                    field_name: field.name,
                    value,
                    output: field.directive.output.clone(),
                });
            }
        }

        access.push(record);
    }

    Ok(Collected {
        tasks: tasks.into_values().collect(),
        access,
    })
}
