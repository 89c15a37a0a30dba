use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::DbError;

/// An engine-native value: what a bind slot holds and what a fetched column yields.
///
/// `Null` doubles as the absent marker when materializing scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer value (64-bit)
    Integer(i64),
    /// Floating point value (64-bit)
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Blob(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Integer(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Real(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_int() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        }
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Explicit binary wrapper: always binds as a blob, whatever the bytes look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary(pub Vec<u8>);

/// A dynamically typed host value, as handed to the parameter binder.
///
/// Only some variants are bindable; the binder applies a fixed coercion table and
/// rejects everything else with [`DbError::ParameterError`] naming the type.
/// ```rust
/// use coop_sqlite::prelude::*;
///
/// let params = params![1, "alice", true, None::<i64>, Binary(vec![0, 1])];
/// assert_eq!(params.len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Integer(i64),
    /// Integer outside (or possibly outside) the 64-bit range
    BigInteger(i128),
    Float(f64),
    /// Text in a recognized encoding
    Str(String),
    Symbol(String),
    /// Bytes with no declared encoding
    Bytes(Vec<u8>),
    Binary(Vec<u8>),
    Timestamp(NaiveDateTime),
    Array(Vec<HostValue>),
    /// Ordered key/value mapping
    Hash(Vec<(HostValue, HostValue)>),
    /// Named fields of a structured record
    Record(serde_json::Map<String, JsonValue>),
    /// An opaque host object, carried by type name only
    Object(String),
}

impl HostValue {
    /// Human readable name of this value's type, used in binder errors.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Bool(_) => "boolean",
            HostValue::Integer(_) => "integer",
            HostValue::BigInteger(_) => "big integer",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "string",
            HostValue::Symbol(_) => "symbol",
            HostValue::Bytes(_) => "bytes",
            HostValue::Binary(_) => "binary",
            HostValue::Timestamp(_) => "timestamp",
            HostValue::Array(_) => "array",
            HostValue::Hash(_) => "hash",
            HostValue::Record(_) => "record",
            HostValue::Object(name) => name.as_str(),
        }
    }

    /// Build a mapping from key/value pairs.
    pub fn hash<K, V, I>(pairs: I) -> Self
    where
        K: Into<HostValue>,
        V: Into<HostValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        HostValue::Hash(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn symbol(name: &str) -> Self {
        HostValue::Symbol(name.to_string())
    }

    /// Capture the named fields of a serializable struct.
    ///
    /// # Errors
    /// Returns `DbError::ParameterError` if the value does not serialize to a record.
    pub fn record<T: Serialize>(value: &T) -> Result<Self, DbError> {
        let json = serde_json::to_value(value)
            .map_err(|e| DbError::ParameterError(format!("cannot serialize record: {e}")))?;
        match json {
            JsonValue::Object(fields) => Ok(HostValue::Record(fields)),
            other => Err(DbError::ParameterError(format!(
                "expected a record, got {}",
                HostValue::from(other).type_name()
            ))),
        }
    }
}

macro_rules! host_value_from {
    ($variant:ident: $($t:ty),+) => {
        $(
            impl From<$t> for HostValue {
                fn from(value: $t) -> Self {
                    HostValue::$variant(value.into())
                }
            }
        )+
    };
}

host_value_from!(Integer: i8, i16, i32, i64, u8, u16, u32);
host_value_from!(Float: f32, f64);
host_value_from!(Str: String, &str);
host_value_from!(Bytes: Vec<u8>, &[u8]);
host_value_from!(Bool: bool);
host_value_from!(Timestamp: NaiveDateTime);
host_value_from!(BigInteger: i128);

impl From<u64> for HostValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => HostValue::Integer(v),
            Err(_) => HostValue::BigInteger(i128::from(value)),
        }
    }
}

impl From<Binary> for HostValue {
    fn from(value: Binary) -> Self {
        HostValue::Binary(value.0)
    }
}

impl From<()> for HostValue {
    fn from((): ()) -> Self {
        HostValue::Nil
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(values: Vec<HostValue>) -> Self {
        HostValue::Array(values)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Nil, Into::into)
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HostValue::Nil,
            Value::Integer(i) => HostValue::Integer(i),
            Value::Real(f) => HostValue::Float(f),
            Value::Text(s) => HostValue::Str(s),
            Value::Blob(b) => HostValue::Binary(b),
        }
    }
}

impl From<JsonValue> for HostValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => HostValue::Nil,
            JsonValue::Bool(b) => HostValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    HostValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    HostValue::BigInteger(i128::from(u))
                } else {
                    HostValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => HostValue::Str(s),
            JsonValue::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            JsonValue::Object(fields) => HostValue::Record(fields),
        }
    }
}

/// Arguments for one statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<HostValue>);

impl Params {
    #[must_use]
    pub fn new(values: Vec<HostValue>) -> Self {
        Params(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostValue> {
        self.0.iter()
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::default()
    }
}

impl From<Vec<HostValue>> for Params {
    fn from(values: Vec<HostValue>) -> Self {
        Params(values)
    }
}

impl From<&[HostValue]> for Params {
    fn from(values: &[HostValue]) -> Self {
        Params(values.to_vec())
    }
}

impl From<HostValue> for Params {
    fn from(value: HostValue) -> Self {
        Params(vec![value])
    }
}

/// Build [`Params`] from a list of expressions convertible into [`HostValue`].
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::default()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::new(vec![$($crate::HostValue::from($value)),+])
    };
}
