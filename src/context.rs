//! Shared handler context.
//!
//! Provides the read-only key-value mapping handed to every aggregate handler
//! invocation of a `process` call.

use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable context shared by all handler invocations.
///
/// Cloning is cheap: the underlying map is reference-counted and never
/// mutated after construction, so it can be read from concurrent handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: Arc<HashMap<String, Value>>,
}

impl Context {
    /// Create a context from a prepared map.
    ///
    /// # Example
    /// ```
    /// use std::collections::HashMap;
    /// use combine::Context;
    ///
    /// let mut values = HashMap::new();
    /// values.insert("env".to_string(), serde_json::json!("prod"));
    ///
    /// let ctx = Context::new(values);
    /// assert_eq!(ctx.get_str("env"), Some("prod"));
    /// ```
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Create an empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a [`ContextBuilder`].
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Get a raw context value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Get a numeric value by key; integers widen to `f64`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Get an integer value by key.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    /// Get a boolean value by key.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all context keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Borrow the whole mapping.
    pub fn as_map(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(values: HashMap<String, Value>) -> Self {
        Self::new(values)
    }
}

/// Fluent builder for [`Context`].
///
/// # Example
/// ```
/// use combine::ContextBuilder;
///
/// let ctx = ContextBuilder::new()
///     .set("factor", 1.5)
///     .set("env", "prod")
///     .set("trace", true)
///     .build();
///
/// assert_eq!(ctx.get_f64("factor"), Some(1.5));
/// assert_eq!(ctx.get_bool("trace"), Some(true));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    values: HashMap<String, Value>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Copy every entry of `values` into the builder.
    pub fn extend(mut self, values: HashMap<String, Value>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn build(self) -> Context {
        Context::new(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_context() {
        let ctx = Context::empty();
        assert!(ctx.is_empty());
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_builder_sets_typed_values() {
        let ctx = ContextBuilder::new()
            .set("factor", 1.5)
            .set("env", "prod")
            .set("region", "ap-northeast-1")
            .set("trace", true)
            .set("retries", 3)
            .build();

        assert_eq!(ctx.len(), 5);
        assert_eq!(ctx.get_f64("factor"), Some(1.5));
        assert_eq!(ctx.get_str("env"), Some("prod"));
        assert_eq!(ctx.get_bool("trace"), Some(true));
        assert_eq!(ctx.get_i64("retries"), Some(3));
        assert_eq!(ctx.get_str("factor"), None);
    }

    #[test]
    fn test_builder_overwrites_keys() {
        let ctx = Context::builder().set("env", "dev").set("env", "prod").build();
        assert_eq!(ctx.get_str("env"), Some("prod"));
    }

    #[test]
    fn test_keys_and_map_view() {
        let ctx = Context::builder().set("env", "prod").set("retries", 3).build();

        let mut keys: Vec<&String> = ctx.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["env", "retries"]);
        assert!(ctx.contains_key("retries"));
        assert_eq!(ctx.as_map().get("retries"), Some(&json!(3)));
    }

    #[test]
    fn test_clone_shares_values() {
        let ctx = Context::builder().set("env", "prod").build();
        let copy = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.values, &copy.values));
        assert_eq!(copy.get("env"), Some(&json!("prod")));
    }

    #[test]
    fn test_serialization_is_plain_map() {
        let ctx = Context::builder().set("env", "prod").build();
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value, json!({"env": "prod"}));

        let back: Context = serde_json::from_value(value).unwrap();
        assert_eq!(back, ctx);
    }
}
