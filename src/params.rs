use chrono::NaiveDateTime;
use rusqlite::Statement;
use serde_json::Value as JsonValue;

use crate::error::DbError;
use crate::types::{HostValue, Params, Value};

/// Markers SQLite accepts in front of a named placeholder.
const NAME_MARKERS: [char; 3] = [':', '@', '$'];

/// Convert a single host value into an engine-native bind value.
///
/// # Errors
///
/// Returns `DbError::ParameterError` naming the value's type when it cannot be bound.
pub fn coerce(value: &HostValue) -> Result<Value, DbError> {
    match value {
        HostValue::Nil => Ok(Value::Null),
        HostValue::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        HostValue::Integer(i) => Ok(Value::Integer(*i)),
        HostValue::BigInteger(i) => i64::try_from(*i)
            .map(Value::Integer)
            .map_err(|_| unbindable(value)),
        HostValue::Float(f) => Ok(Value::Real(*f)),
        HostValue::Str(s) | HostValue::Symbol(s) => Ok(Value::Text(s.clone())),
        HostValue::Bytes(b) | HostValue::Binary(b) => Ok(Value::Blob(b.clone())),
        HostValue::Timestamp(dt) => Ok(Value::Text(format_timestamp(dt))),
        HostValue::Array(_) | HostValue::Hash(_) | HostValue::Record(_) | HostValue::Object(_) => {
            Err(unbindable(value))
        }
    }
}

fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%F %T%.f").to_string()
}

fn unbindable(value: &HostValue) -> DbError {
    DbError::ParameterError(format!("cannot bind value of type {}", value.type_name()))
}

/// Resolved bind slots for one statement, 1-based like the engine.
///
/// Every slot starts as NULL, so rebinding never leaks values from a previous run.
#[derive(Debug, Clone, PartialEq)]
pub struct BindSlots {
    names: Vec<Option<String>>,
    values: Vec<Value>,
}

impl BindSlots {
    /// Read the placeholder layout of a compiled statement.
    #[must_use]
    pub fn for_statement(stmt: &Statement<'_>) -> Self {
        let count = stmt.parameter_count();
        let names = (1..=count)
            .map(|idx| stmt.parameter_name(idx).map(str::to_string))
            .collect();
        Self::with_names(names)
    }

    pub(crate) fn with_names(names: Vec<Option<String>>) -> Self {
        let values = vec![Value::Null; names.len()];
        Self { names, values }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Fill slots from positional values, mappings and records.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ParameterError` for unbindable values, unsupported mapping
    /// keys, or positional indices past the statement's placeholders.
    pub fn fill(&mut self, params: &Params) -> Result<(), DbError> {
        let mut next = 1;
        for arg in params.iter() {
            match arg {
                HostValue::Hash(pairs) => {
                    for (key, value) in pairs {
                        self.bind_keyed(key, value)?;
                    }
                }
                HostValue::Record(fields) => self.bind_record(fields)?,
                other => {
                    self.set(next, coerce(other)?)?;
                    next += 1;
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, index: usize, value: Value) -> Result<(), DbError> {
        let count = self.values.len();
        match index.checked_sub(1).and_then(|i| self.values.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DbError::ParameterError(format!(
                "parameter index {index} out of range (statement has {count} parameters)"
            ))),
        }
    }

    fn bind_keyed(&mut self, key: &HostValue, value: &HostValue) -> Result<(), DbError> {
        match key {
            HostValue::Integer(idx) => {
                let index = usize::try_from(*idx).map_err(|_| {
                    DbError::ParameterError(format!("parameter index {idx} out of range"))
                })?;
                self.set(index, coerce(value)?)
            }
            HostValue::Str(name) | HostValue::Symbol(name) => {
                match self.index_of(name) {
                    Some(index) => self.set(index, coerce(value)?),
                    None => {
                        tracing::trace!(name = %name, "no placeholder for parameter name");
                        Ok(())
                    }
                }
            }
            other => Err(DbError::ParameterError(format!(
                "unsupported parameter key type: {}",
                other.type_name()
            ))),
        }
    }

    fn bind_record(&mut self, fields: &serde_json::Map<String, JsonValue>) -> Result<(), DbError> {
        for idx in 0..self.names.len() {
            let Some(field) = self.names[idx].as_deref().map(strip_marker) else {
                continue;
            };
            let value = match fields.get(field) {
                Some(json) => coerce(&HostValue::from(json.clone()))?,
                None => Value::Null,
            };
            self.values[idx] = value;
        }
        Ok(())
    }

    /// 1-based index of a named placeholder, accepting the name with or without marker.
    fn index_of(&self, key: &str) -> Option<usize> {
        let matches = |candidate: &str| {
            self.names
                .iter()
                .position(|name| name.as_deref() == Some(candidate))
                .map(|pos| pos + 1)
        };
        if key.starts_with(NAME_MARKERS) {
            return matches(key);
        }
        NAME_MARKERS
            .iter()
            .find_map(|marker| matches(&format!("{marker}{key}")))
    }

    /// Push every slot into the compiled statement.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the engine rejects a binding.
    pub fn apply(&self, stmt: &mut Statement<'_>) -> Result<(), DbError> {
        for (idx, value) in self.values.iter().enumerate() {
            stmt.raw_bind_parameter(idx + 1, value)?;
        }
        Ok(())
    }
}

fn strip_marker(name: &str) -> &str {
    name.strip_prefix(NAME_MARKERS).unwrap_or(name)
}

/// Bind `params` onto a compiled statement, resetting every slot first.
///
/// # Errors
///
/// Returns `DbError::ParameterError` if any value or key cannot be bound.
pub fn bind(stmt: &mut Statement<'_>, params: &Params) -> Result<(), DbError> {
    let mut slots = BindSlots::for_statement(stmt);
    slots.fill(params)?;
    slots.apply(stmt)
}
