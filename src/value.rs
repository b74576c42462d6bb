//! Value variant shared across the handler boundary.
//!
//! Record fields are read into [`FieldValue`], handed to aggregate handlers,
//! and handler results are coerced back into concrete field types through
//! [`FromFieldValue`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Represents the values that can cross between records and handlers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absence of a value. Writing it assigns the target's default.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Coerce into a concrete type; see [`FromFieldValue`] for the rules.
    pub fn coerce<T: FromFieldValue>(self) -> Result<T, CoerceError> {
        T::from_field_value(self)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::List(l) => {
                write!(f, "[")?;
                for (i, item) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Null => write!(f, "null"),
        }
    }
}

/// Failed conversion of a [`FieldValue`] into a concrete Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce {found} value into {expected}")]
pub struct CoerceError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl CoerceError {
    pub fn new<T: ?Sized>(found: &FieldValue) -> Self {
        Self {
            expected: std::any::type_name::<T>(),
            found: found.kind(),
        }
    }
}

/// Conversion from a [`FieldValue`] into a field or callback argument type.
///
/// Same-kind values convert directly. Across kinds only safe conversions are
/// accepted:
///
/// * integers convert between widths when the value fits
/// * integers widen to floats; floats narrow to integers only when integral
/// * numbers and booleans render into `String`
/// * strings parse into numbers and booleans
/// * lists convert element-wise into `Vec<T>`
/// * `Null` maps to `None` for `Option<T>`
pub trait FromFieldValue: Sized {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError>;
}

impl FromFieldValue for FieldValue {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        Ok(value)
    }
}

macro_rules! impl_from_field_value_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromFieldValue for $t {
                fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
                    match value {
                        FieldValue::Int(i) => {
                            <$t>::try_from(i).map_err(|_| CoerceError::new::<$t>(&value))
                        }
                        // Out-of-range floats saturate in i128 and then fail try_from
                        FieldValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                            <$t>::try_from(f as i128).map_err(|_| CoerceError::new::<$t>(&value))
                        }
                        FieldValue::String(ref s) => s
                            .trim()
                            .parse::<$t>()
                            .map_err(|_| CoerceError::new::<$t>(&value)),
                        ref other => Err(CoerceError::new::<$t>(other)),
                    }
                }
            }
        )*
    };
}

impl_from_field_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

macro_rules! impl_field_value_from_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    FieldValue::Int(value as i64)
                }
            }
        )*
    };
}

impl_field_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

// Unsigned widths that do not fit in i64 fall back to a float.
macro_rules! impl_field_value_from_wide {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    match i64::try_from(value) {
                        Ok(i) => FieldValue::Int(i),
                        Err(_) => FieldValue::Float(value as f64),
                    }
                }
            }
        )*
    };
}

impl_field_value_from_wide!(u64, usize);

impl FromFieldValue for f64 {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Float(f) => Ok(f),
            FieldValue::Int(i) => Ok(i as f64),
            FieldValue::String(ref s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CoerceError::new::<f64>(&value)),
            ref other => Err(CoerceError::new::<f64>(other)),
        }
    }
}

impl FromFieldValue for f32 {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Float(f) => Ok(f as f32),
            FieldValue::Int(i) => Ok(i as f32),
            FieldValue::String(ref s) => s
                .trim()
                .parse::<f32>()
                .map_err(|_| CoerceError::new::<f32>(&value)),
            ref other => Err(CoerceError::new::<f32>(other)),
        }
    }
}

impl FromFieldValue for bool {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            FieldValue::String(ref s) => s
                .trim()
                .parse::<bool>()
                .map_err(|_| CoerceError::new::<bool>(&value)),
            ref other => Err(CoerceError::new::<bool>(other)),
        }
    }
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::String(s) => Ok(s),
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Bool(_) => {
                Ok(value.to_string())
            }
            ref other => Err(CoerceError::new::<String>(other)),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Vec<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::List(items) => items.into_iter().map(T::from_field_value).collect(),
            ref other => Err(CoerceError::new::<Vec<T>>(other)),
        }
    }
}

impl<T: FromFieldValue> FromFieldValue for Option<T> {
    fn from_field_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field_value(other).map(Some),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value as f64)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Array(arr) => {
                FieldValue::List(arr.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Null => FieldValue::Null,
            // Nested objects are carried as their JSON text
            serde_json::Value::Object(_) => FieldValue::String(value.to_string()),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(b),
            FieldValue::Int(i) => serde_json::Value::from(i),
            FieldValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::String(s) => serde_json::Value::String(s),
            FieldValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
        }
    }
}
