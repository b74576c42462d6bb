//! Error taxonomy for batch processing.

use thiserror::Error;

use crate::value::CoerceError;

/// Failure signalled by an aggregate handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors returned by [`Combine`](crate::Combine) operations.
///
/// Classification:
/// - [`CombineError::InvalidItem`]: batch shape problems, raised before any handler runs
/// - [`CombineError::UnregisteredHandler`]: a directive names an unknown function; fail-fast
/// - [`CombineError::Handler`]: a handler reported failure
/// - [`CombineError::MethodNotFound`], [`CombineError::ParameterTypeMismatch`],
///   [`CombineError::FieldNotFound`], [`CombineError::TypeMismatch`]: write-back failures
/// - [`CombineError::RecordTypeMismatch`]: a record table and the item it was applied to disagree
/// - [`CombineError::Config`], [`CombineError::Io`]: configuration loading
#[derive(Debug, Error)]
pub enum CombineError {
    /// A batch element is not a registered record type (or a box of one).
    #[error("batch element {index} is not a registered record type")]
    InvalidItem { index: usize },

    /// A directive names a function with no registered handler.
    #[error("handler {name} not registered")]
    UnregisteredHandler { name: String },

    /// Registration was attempted without a handler.
    #[error("missing handler for {name}")]
    MissingHandler { name: String },

    /// A handler signalled failure.
    #[error("handler {name} failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },

    /// An output target names a callback the record does not expose.
    #[error("method {method} not found on {record}")]
    MethodNotFound { record: &'static str, method: String },

    /// The resolved value cannot be adapted to the callback argument.
    #[error("argument for {record}.{method} has wrong type: {source}")]
    ParameterTypeMismatch {
        record: &'static str,
        method: String,
        #[source]
        source: CoerceError,
    },

    /// An output target names a field the record does not declare.
    #[error("cannot set field {field} on {record}: no such field")]
    FieldNotFound { record: &'static str, field: String },

    /// The resolved value cannot be assigned to the target field.
    #[error("cannot assign to field {record}.{field}: {source}")]
    TypeMismatch {
        record: &'static str,
        field: String,
        #[source]
        source: CoerceError,
    },

    /// A record type's capability table was applied to an item of another type.
    #[error("batch element is not a {record}")]
    RecordTypeMismatch { record: &'static str },

    /// Invalid configuration content.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Standard result alias.
pub type Result<T> = std::result::Result<T, CombineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use std::error::Error as _;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = CombineError::UnregisteredHandler {
            name: "uppercase".to_string(),
        };
        assert_eq!(err.to_string(), "handler uppercase not registered");

        let err = CombineError::MethodNotFound {
            record: "Item",
            method: "Nope".to_string(),
        };
        assert_eq!(err.to_string(), "method Nope not found on Item");
    }

    #[test]
    fn test_type_mismatch_keeps_source() {
        let err = CombineError::TypeMismatch {
            record: "Item",
            field: "Score".to_string(),
            source: CoerceError::new::<i64>(&FieldValue::List(vec![])),
        };
        assert!(err.to_string().contains("Item.Score"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_handler_error_from_str() {
        let err: HandlerError = "db unavailable".into();
        assert_eq!(err.message(), "db unavailable");
    }
}
