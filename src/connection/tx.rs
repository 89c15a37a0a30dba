use std::time::Duration;

use super::Connection;
use crate::error::DbError;
use crate::transaction::{TransactionMode, TxAbort, TxOutcome};

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

impl Connection {
    /// Run `body` inside `BEGIN` ... `COMMIT`.
    ///
    /// * `Ok(value)` commits and yields `TxOutcome::Committed(value)`;
    /// * `Err(TxAbort::Rollback)` rolls back and yields `TxOutcome::RolledBack`;
    /// * `Err(TxAbort::Fault(e))` rolls back and returns `e` unchanged.
    ///
    /// Transactions do not nest: beginning one while another is open fails.
    ///
    /// ```rust
    /// use coop_sqlite::prelude::*;
    ///
    /// # fn demo() -> Result<(), DbError> {
    /// let conn = Connection::open_in_memory()?;
    /// conn.execute("create table t (x)", ())?;
    /// let outcome = conn.transaction(|tx| {
    ///     tx.execute("insert into t values (1)", ())?;
    ///     Ok(tx.last_insert_rowid()?)
    /// })?;
    /// assert_eq!(outcome, TxOutcome::Committed(1));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the body's fault, or a fault from `BEGIN`/`COMMIT`.
    pub fn transaction<T, F>(&self, body: F) -> Result<TxOutcome<T>, DbError>
    where
        F: FnOnce(&Self) -> Result<T, TxAbort>,
    {
        self.transaction_with(TransactionMode::Deferred, body)
    }

    /// [`transaction`](Connection::transaction) with an explicit locking mode.
    ///
    /// # Errors
    ///
    /// Returns the body's fault, or a fault from `BEGIN`/`COMMIT`.
    pub fn transaction_with<T, F>(&self, mode: TransactionMode, body: F) -> Result<TxOutcome<T>, DbError>
    where
        F: FnOnce(&Self) -> Result<T, TxAbort>,
    {
        self.execute(mode.begin_sql(), ())?;
        match body(self) {
            Ok(value) => match self.execute("COMMIT", ()) {
                Ok(_) => Ok(TxOutcome::Committed(value)),
                Err(err) => {
                    tracing::debug!(error = %err, "commit failed, rolling back");
                    self.rollback_quietly();
                    Err(err)
                }
            },
            Err(TxAbort::Rollback) => {
                self.rollback_open()?;
                Ok(TxOutcome::RolledBack)
            }
            Err(TxAbort::Fault(err)) => {
                tracing::debug!(error = %err, "transaction body failed, rolling back");
                self.rollback_quietly();
                Err(err)
            }
        }
    }

    /// Roll back if a transaction is still open, retrying briefly on contention.
    fn rollback_open(&self) -> Result<(), DbError> {
        if !self.transaction_active()? {
            return Ok(());
        }
        let db = self.handle()?;
        for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
            self.emit_trace("ROLLBACK");
            match db.execute_batch("ROLLBACK") {
                Ok(()) => return Ok(()),
                Err(err)
                    if crate::error::is_contention(&err)
                        && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
                {
                    self.scheduler().sleep(delay);
                }
                Err(err) => return Err(self.fault(err)),
            }
        }
        Err(DbError::BusyError("rollback retries exhausted".into()))
    }

    /// Roll back while another fault is already on its way to the caller.
    fn rollback_quietly(&self) {
        if let Err(err) = self.rollback_open() {
            tracing::warn!(error = %err, "rollback failed");
        }
    }
}
