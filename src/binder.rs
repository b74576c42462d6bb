//! Result write-back.
//!
//! Resolves the handler result for every entry of a task and applies it to the
//! originating record, either by field assignment or through a callback.

use std::any::Any;
use std::sync::Arc;

use crate::collector::Task;
use crate::directive::OutputTarget;
use crate::error::Result;
use crate::handler::ResultMap;
use crate::record::RecordAccess;

/// Apply `result` to every entry of `task`, in discovery order.
///
/// Stops at the first failing entry; writes made for earlier entries stay.
pub(crate) fn bind(
    task: &Task,
    result: &ResultMap,
    batch: &mut [&mut dyn Any],
    access: &[Arc<dyn RecordAccess>],
) -> Result<()> {
    for (position, entry) in task.entries.iter().enumerate() {
        let value = result.resolve(position, &entry.value).cloned();
        let record = &access[entry.record];
        let item: &mut dyn Any = &mut *batch[entry.record];

        tracing::trace!(
            "Binding {} result #{} to {}[{}] field {} ({}) -> {}",
            task.name,
            position,
            record.type_name(),
            entry.record,
            entry.field_name,
            entry.field_index,
            entry.output
        );

        match &entry.output {
            OutputTarget::Callback(method) => record.invoke(item, method, value)?,
            OutputTarget::Field(field) => record.write(item, field, value)?,
            OutputTarget::SameField => record.write(item, entry.field_name, value)?,
        }
    }
    Ok(())
}
