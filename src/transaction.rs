use crate::error::DbError;

/// How `BEGIN` acquires locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Locks are taken on first read or write
    #[default]
    Deferred,
    /// A write lock is taken immediately
    Immediate,
    /// Readers and writers are excluded immediately
    Exclusive,
}

impl TransactionMode {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            TransactionMode::Deferred => "BEGIN DEFERRED",
            TransactionMode::Immediate => "BEGIN IMMEDIATE",
            TransactionMode::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Why a transaction body stopped early.
#[derive(Debug)]
pub enum TxAbort {
    /// Roll back quietly; the wrapper reports [`TxOutcome::RolledBack`].
    Rollback,
    /// Roll back and hand the fault to the caller unchanged.
    Fault(DbError),
}

impl From<DbError> for TxAbort {
    fn from(err: DbError) -> Self {
        TxAbort::Fault(err)
    }
}

/// Result of a transaction that did not fault.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome<T> {
    Committed(T),
    RolledBack,
}

impl<T> TxOutcome<T> {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed(_))
    }

    /// The body's value if the transaction committed.
    pub fn committed(self) -> Option<T> {
        match self {
            TxOutcome::Committed(value) => Some(value),
            TxOutcome::RolledBack => None,
        }
    }
}

/// Leave a transaction body and roll back without raising.
///
/// ```rust
/// use coop_sqlite::prelude::*;
///
/// # fn demo(conn: &Connection) -> Result<(), DbError> {
/// let outcome = conn.transaction(|tx| {
///     tx.execute("delete from t", ())?;
///     coop_sqlite::rollback()
/// })?;
/// assert_eq!(outcome, TxOutcome::<()>::RolledBack);
/// # Ok(())
/// # }
/// ```
pub fn rollback<T>() -> Result<T, TxAbort> {
    Err(TxAbort::Rollback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_statements() {
        assert_eq!(TransactionMode::default().begin_sql(), "BEGIN DEFERRED");
        assert_eq!(TransactionMode::Immediate.begin_sql(), "BEGIN IMMEDIATE");
        assert_eq!(TransactionMode::Exclusive.begin_sql(), "BEGIN EXCLUSIVE");
    }

    #[test]
    fn faults_convert_into_aborts() {
        let abort: TxAbort = DbError::ClosedError.into();
        assert!(matches!(abort, TxAbort::Fault(DbError::ClosedError)));
        assert!(matches!(rollback::<()>(), Err(TxAbort::Rollback)));
    }

    #[test]
    fn outcome_accessors() {
        assert_eq!(TxOutcome::Committed(3).committed(), Some(3));
        assert!(!TxOutcome::<i32>::RolledBack.is_committed());
    }
}
