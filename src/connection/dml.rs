use super::Connection;
use crate::error::DbError;
use crate::statement::execute_step;
use crate::types::Params;

impl Connection {
    /// Run `sql` to completion; returns the rows changed by its last statement.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<usize, DbError> {
        Ok(self
            .run_chain(sql, params.into(), execute_step)?
            .unwrap_or_default())
    }

    /// Compile one statement and run it once per parameter set; returns total rows changed.
    ///
    /// Stops at the first failing set. Sets that already ran keep their effects
    /// unless the call is wrapped in [`transaction`](Connection::transaction).
    ///
    /// # Errors
    ///
    /// Returns the first fault raised by compiling or by any set.
    pub fn batch_execute<I, P>(&self, sql: &str, sets: I) -> Result<usize, DbError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        self.prepare(sql)?.batch_execute(sets)
    }

    /// Like [`batch_execute`](Connection::batch_execute), pulling parameter sets
    /// from `next` until it returns `None`.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised by compiling or by any set.
    pub fn batch_execute_with<F>(&self, sql: &str, next: F) -> Result<usize, DbError>
    where
        F: FnMut() -> Option<Params>,
    {
        self.prepare(sql)?.batch_execute_with(next)
    }
}
