//! SQL values crossing the store boundary.
//!
//! [`Value`] is deliberately small: the storage classes of an embedded
//! relational store, nothing more. Typed extraction is strict — a column
//! holding an integer will not be read as text — matching the behavior
//! callers rely on for catching schema drift early.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single bound parameter or extracted column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit integer storage class.
    Integer(i64),
    /// 64-bit float storage class.
    Real(f64),
    /// UTF-8 text storage class.
    Text(String),
    /// Raw bytes storage class.
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the storage class, for diagnostics and type errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Whether this value is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Strict conversion out of a [`Value`], used by column extraction.
///
/// Implementations reject every storage class other than their own with
/// [`Error::ValueType`]; there is no implicit coercion.
pub trait FromValue: Sized {
    /// Storage-class name used in type-mismatch errors.
    const EXPECTED: &'static str;

    /// Convert, or fail with [`Error::ValueType`].
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T: FromValue>(value: &Value) -> Error {
    Error::ValueType {
        expected: T::EXPECTED,
        found: value.type_name(),
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => {
                i32::try_from(v).map_err(|_| Error::Overflow { what: "i32 column" })
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "real";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "blob";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}
