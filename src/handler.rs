//! Aggregate handler contract and result mapping.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::HandlerError;
use crate::value::FieldValue;

/// Trait for aggregate functions.
///
/// A handler is invoked once per batch with every value collected for its
/// name, in discovery order, and returns a [`ResultMap`] describing the value
/// to write back for each position. Handlers may run concurrently with other
/// handlers and must not rely on their evaluation order.
pub trait AggregateHandler: Send + Sync {
    /// Aggregate `values` under the shared `context`.
    ///
    /// # Returns
    ///
    /// * `Ok(map)` - Results keyed by position (preferred) or original value
    /// * `Err(HandlerError)` - The whole `process` call fails with this error
    fn handle(&self, values: &[FieldValue], context: &Context) -> Result<ResultMap, HandlerError>;
}

/// Plain functions and closures are handlers.
impl<F> AggregateHandler for F
where
    F: Fn(&[FieldValue], &Context) -> Result<ResultMap, HandlerError> + Send + Sync,
{
    fn handle(&self, values: &[FieldValue], context: &Context) -> Result<ResultMap, HandlerError> {
        self(values, context)
    }
}

/// Handler output.
///
/// Keys are either the zero-based position of a value in the submitted list or
/// the original value itself. Lookups try the position first, then the value.
/// Positions with no entry resolve to absence, which assigns the target's
/// default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    by_position: HashMap<usize, FieldValue>,
    // FieldValue holds floats, so keys are matched by equality
    by_value: Vec<(FieldValue, FieldValue)>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_position: HashMap::with_capacity(capacity),
            by_value: Vec::new(),
        }
    }

    /// Map the value submitted at `position`.
    pub fn insert(&mut self, position: usize, value: impl Into<FieldValue>) -> &mut Self {
        self.by_position.insert(position, value.into());
        self
    }

    /// Map every submitted value equal to `key`.
    pub fn insert_by_value(
        &mut self,
        key: impl Into<FieldValue>,
        value: impl Into<FieldValue>,
    ) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.by_value.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.by_value.push((key, value)),
        }
        self
    }

    pub fn get_position(&self, position: usize) -> Option<&FieldValue> {
        self.by_position.get(&position)
    }

    pub fn get_by_value(&self, key: &FieldValue) -> Option<&FieldValue> {
        self.by_value
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Resolve the result for one submitted value: position first, then the
    /// original value. `Null` results count as absent.
    pub fn resolve(&self, position: usize, original: &FieldValue) -> Option<&FieldValue> {
        self.get_position(position)
            .or_else(|| self.get_by_value(original))
            .filter(|value| !value.is_null())
    }

    /// Number of entries across both key strategies.
    pub fn len(&self) -> usize {
        self.by_position.len() + self.by_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty() && self.by_value.is_empty()
    }
}

impl<V: Into<FieldValue>> FromIterator<(usize, V)> for ResultMap {
    fn from_iter<I: IntoIterator<Item = (usize, V)>>(iter: I) -> Self {
        let mut map = ResultMap::new();
        for (position, value) in iter {
            map.insert(position, value);
        }
        map
    }
}

/// One result per submitted value, in submission order.
impl<V: Into<FieldValue>> From<Vec<V>> for ResultMap {
    fn from(values: Vec<V>) -> Self {
        values.into_iter().enumerate().collect()
    }
}
