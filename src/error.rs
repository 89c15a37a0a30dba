use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Every fault surfaced by this crate.
///
/// Engine faults are translated exactly once, at the `rusqlite` boundary, into one of
/// these variants. Match on the variant to distinguish contention, cancellation and
/// ordinary SQL faults:
/// ```rust
/// use coop_sqlite::prelude::*;
///
/// # fn demo() -> Result<(), DbError> {
/// let conn = Connection::open_in_memory()?;
/// match conn.query("select * from missing", ()) {
///     Err(DbError::SqlError { message, .. }) => assert!(message.contains("missing")),
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unable to open database {location}: {message}")]
    OpenError { location: String, message: String },

    #[error("Database is closed")]
    ClosedError,

    #[error("{message}")]
    SqlError {
        code: i32,
        message: String,
        offset: Option<usize>,
    },

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Database is busy: {0}")]
    BusyError(String),

    #[error("Query interrupted: {0}")]
    InterruptError(String),

    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl DbError {
    /// Engine result code carried by this fault, if it came from the engine.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::SqlError { code, .. } => Some(*code),
            DbError::BusyError(_) => Some(ffi::SQLITE_BUSY),
            DbError::InterruptError(_) => Some(ffi::SQLITE_INTERRUPT),
            _ => None,
        }
    }

    /// Byte offset into the SQL text where the engine located the fault.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            DbError::SqlError { offset, .. } => *offset,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::BusyError(_))
    }

    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, DbError::InterruptError(_))
    }

    /// Shift a compile-error offset reported for one statement so it points into the
    /// full multi-statement text.
    pub(crate) fn shift_offset(self, by: usize) -> Self {
        match self {
            DbError::SqlError {
                code,
                message,
                offset: Some(offset),
            } => DbError::SqlError {
                code,
                message,
                offset: Some(offset + by),
            },
            other => other,
        }
    }
}

/// Returns true when the engine reported lock contention.
pub(crate) fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked,
                ..
            },
            _
        )
    )
}

/// Returns true when the engine ran out of text in the middle of a statement.
pub(crate) fn is_incomplete(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) | rusqlite::Error::SqlInputError { msg, .. } => {
            msg == "incomplete input"
        }
        _ => false,
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        DbError::BusyError(message)
                    }
                    ErrorCode::OperationInterrupted => DbError::InterruptError(message),
                    _ => DbError::SqlError {
                        code: failure.extended_code,
                        message,
                        offset: None,
                    },
                }
            }
            rusqlite::Error::SqlInputError {
                error, msg, offset, ..
            } => DbError::SqlError {
                code: error.extended_code,
                message: msg,
                offset: usize::try_from(offset).ok(),
            },
            rusqlite::Error::InvalidParameterCount(given, expected) => DbError::ParameterError(
                format!("expected {expected} parameters, {given} given"),
            ),
            rusqlite::Error::InvalidParameterName(name) => {
                DbError::ParameterError(format!("invalid parameter name: {name}"))
            }
            other => DbError::SqlError {
                code: ffi::SQLITE_ERROR,
                message: other.to_string(),
                offset: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some(message.to_string()))
    }

    #[test]
    fn busy_and_locked_become_busy_errors() {
        let err = DbError::from(failure(ffi::SQLITE_BUSY, "database is locked"));
        assert!(err.is_busy());
        assert_eq!(err.code(), Some(ffi::SQLITE_BUSY));

        let err = DbError::from(failure(ffi::SQLITE_LOCKED, "database table is locked"));
        assert!(err.is_busy());
    }

    #[test]
    fn interrupt_is_distinguished() {
        let err = DbError::from(failure(ffi::SQLITE_INTERRUPT, "interrupted"));
        assert!(err.is_interrupt());
    }

    #[test]
    fn other_failures_keep_code_and_message() {
        let err = DbError::from(failure(ffi::SQLITE_CONSTRAINT_UNIQUE, "UNIQUE constraint failed"));
        match err {
            DbError::SqlError { code, message, offset } => {
                assert_eq!(code, ffi::SQLITE_CONSTRAINT_UNIQUE);
                assert!(message.contains("UNIQUE"));
                assert_eq!(offset, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn incomplete_input_detection() {
        assert!(is_incomplete(&failure(ffi::SQLITE_ERROR, "incomplete input")));
        assert!(!is_incomplete(&failure(ffi::SQLITE_ERROR, "near \"x\": syntax error")));
    }

    #[test]
    fn contention_detection() {
        assert!(is_contention(&failure(ffi::SQLITE_BUSY, "busy")));
        assert!(!is_contention(&failure(ffi::SQLITE_ERROR, "boom")));
    }

    #[test]
    fn offsets_shift_only_when_present() {
        let err = DbError::SqlError {
            code: 1,
            message: "near \"x\": syntax error".into(),
            offset: Some(3),
        };
        assert_eq!(err.shift_offset(10).offset(), Some(13));
        assert_eq!(DbError::ClosedError.shift_offset(10).offset(), None);
    }
}
