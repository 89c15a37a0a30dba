//! Stepping a compiled statement, and the prepared-statement handle built on it.

use std::sync::Arc;

use rusqlite::Statement;

use crate::busy::BusyRetry;
use crate::connection::Connection;
use crate::error::{DbError, is_contention};
use crate::results::materialize;
use crate::results::{Materialized, ResultSet, ResultShape, Row};
use crate::schedule::YieldController;
use crate::types::{Params, Value};

/// Where a statement is in its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    /// Compiled (or reset) and not yet stepped
    #[default]
    Compiled,
    Stepping,
    /// A row is available to the materializer
    RowAvailable,
    Done,
    Faulted,
}

/// What the row callback wants the driver to do next.
pub(crate) enum StepFlow {
    Continue,
    /// Stop stepping; the statement is reset.
    Halt,
}

enum Halted {
    Engine(rusqlite::Error),
    Host(DbError),
}

/// Step `stmt` until done, a fault, or the callback halts.
///
/// Every step first checks the connection's interrupt flag. Each completed step
/// (row or done) feeds the yield controller. Contention restarts the statement
/// under the busy budget, but only while no row has reached the callback in the
/// failing attempt.
pub(crate) fn drive<F>(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
    mut on_row: F,
) -> Result<(), DbError>
where
    F: FnMut(&rusqlite::Row<'_>) -> Result<StepFlow, DbError>,
{
    let scheduler = conn.scheduler();
    let interrupt = conn.interrupt_flag();
    let mut yielder = YieldController::new(conn.yield_threshold(), scheduler);
    let mut busy = BusyRetry::new(conn.busy_timeout(), scheduler);

    loop {
        *state = StepState::Stepping;
        let mut delivered = false;
        let attempt = {
            let mut rows = stmt.raw_query();
            loop {
                if interrupt.is_pending() {
                    break Err(Halted::Host(interrupt.observed()));
                }
                match rows.next() {
                    Ok(Some(row)) => {
                        yielder.step_completed();
                        delivered = true;
                        *state = StepState::RowAvailable;
                        match on_row(row) {
                            Ok(StepFlow::Continue) => *state = StepState::Stepping,
                            Ok(StepFlow::Halt) => break Ok(()),
                            Err(err) => break Err(Halted::Host(err)),
                        }
                    }
                    Ok(None) => {
                        yielder.step_completed();
                        break Ok(());
                    }
                    Err(err) => break Err(Halted::Engine(err)),
                }
            }
        };

        match attempt {
            Ok(()) => {
                *state = StepState::Done;
                return Ok(());
            }
            Err(Halted::Engine(err)) if is_contention(&err) && !delivered => {
                if let Err(busy_err) = busy.on_busy(&err.to_string()) {
                    *state = StepState::Faulted;
                    return Err(conn.record(busy_err));
                }
            }
            Err(Halted::Engine(err)) => {
                *state = StepState::Faulted;
                return Err(conn.fault(err));
            }
            Err(Halted::Host(err)) => {
                *state = StepState::Faulted;
                return Err(conn.record(err));
            }
        }
    }
}

/// Run a statement to completion and report the rows it changed.
///
/// Statements that change nothing (DDL, reads) report zero rather than the count
/// left over from an earlier write.
pub(crate) fn execute_step(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<usize, DbError> {
    let before = conn.total_changes()?;
    materialize::discard(conn, stmt, state)?;
    if conn.total_changes()? == before {
        return Ok(0);
    }
    conn.changes()
}

/// A statement compiled once and run any number of times.
///
/// Borrowed from its [`Connection`]; it cannot outlive it, and running it resets it
/// first so every operation starts from the first row.
///
/// ```rust
/// use coop_sqlite::prelude::*;
///
/// # fn demo() -> Result<(), DbError> {
/// let conn = Connection::open_in_memory()?;
/// conn.execute("create table t (x)", ())?;
/// let mut insert = conn.prepare("insert into t values (?)")?;
/// for x in 0..3 {
///     insert.execute(params![x])?;
/// }
/// assert_eq!(conn.query_single_value("select count(*) from t", ())?, Some(Value::Integer(3)));
/// # Ok(())
/// # }
/// ```
pub struct PreparedStatement<'conn> {
    conn: &'conn Connection,
    stmt: Statement<'conn>,
    columns: Arc<Vec<String>>,
    sql: String,
    state: StepState,
}

impl<'conn> PreparedStatement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, stmt: Statement<'conn>, sql: &str) -> Self {
        let columns = materialize::column_names(&stmt);
        Self {
            conn,
            stmt,
            columns,
            sql: sql.to_string(),
            state: StepState::Compiled,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Column names, read from the compiled statement without stepping.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    /// Rebind every slot. Slots not covered by `params` become NULL.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ParameterError` for unbindable values or keys.
    pub fn bind(&mut self, params: impl Into<Params>) -> Result<&mut Self, DbError> {
        self.conn.handle()?;
        crate::params::bind(&mut self.stmt, &params.into()).map_err(|e| self.conn.record(e))?;
        self.state = StepState::Compiled;
        Ok(self)
    }

    fn bound(&mut self, params: Params) -> Result<(), DbError> {
        self.conn.start_operation();
        if !params.is_empty() {
            self.bind(params)?;
        } else {
            self.conn.handle()?;
        }
        self.conn.emit_trace(&self.sql);
        Ok(())
    }

    /// Every row as a column mapping.
    ///
    /// An empty `params` runs with the current bindings.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query(&mut self, params: impl Into<Params>) -> Result<ResultSet, DbError> {
        self.bound(params.into())?;
        materialize::rows(self.conn, &mut self.stmt, &mut self.state)
    }

    /// Every row as positional values.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query_tuple(&mut self, params: impl Into<Params>) -> Result<Vec<Vec<Value>>, DbError> {
        self.bound(params.into())?;
        materialize::tuples(self.conn, &mut self.stmt, &mut self.state)
    }

    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query_single_row(&mut self, params: impl Into<Params>) -> Result<Option<Row>, DbError> {
        self.bound(params.into())?;
        materialize::single_row(self.conn, &mut self.stmt, &mut self.state)
    }

    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query_single_column(&mut self, params: impl Into<Params>) -> Result<Vec<Value>, DbError> {
        self.bound(params.into())?;
        materialize::single_column(self.conn, &mut self.stmt, &mut self.state)
    }

    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query_single_value(&mut self, params: impl Into<Params>) -> Result<Option<Value>, DbError> {
        self.bound(params.into())?;
        materialize::single_value(self.conn, &mut self.stmt, &mut self.state)
    }

    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn query_as(
        &mut self,
        shape: ResultShape,
        params: impl Into<Params>,
    ) -> Result<Materialized, DbError> {
        self.bound(params.into())?;
        materialize::collect(self.conn, &mut self.stmt, &mut self.state, shape)
    }

    /// Stream rows through `f` without collecting them. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns the first fault from the engine or from `f`.
    pub fn for_each<F>(&mut self, params: impl Into<Params>, f: F) -> Result<usize, DbError>
    where
        F: FnMut(Row) -> Result<(), DbError>,
    {
        self.bound(params.into())?;
        materialize::each(self.conn, &mut self.stmt, &mut self.state, f)
    }

    /// Run to completion; returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on binding, engine, busy or interrupt faults.
    pub fn execute(&mut self, params: impl Into<Params>) -> Result<usize, DbError> {
        self.bound(params.into())?;
        execute_step(self.conn, &mut self.stmt, &mut self.state)
    }

    /// Rebind and rerun for each parameter set, without recompiling.
    ///
    /// Stops at the first failing set; changes made by earlier sets stay.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised by any set.
    pub fn batch_execute<I, P>(&mut self, sets: I) -> Result<usize, DbError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let mut sets = sets.into_iter();
        self.batch_execute_with(|| sets.next().map(Into::into))
    }

    /// Like [`batch_execute`](Self::batch_execute), pulling sets from `next`
    /// until it returns `None`.
    ///
    /// # Errors
    ///
    /// Returns the first fault raised by any set.
    pub fn batch_execute_with<F>(&mut self, mut next: F) -> Result<usize, DbError>
    where
        F: FnMut() -> Option<Params>,
    {
        self.conn.start_operation();
        let mut total = 0;
        while let Some(params) = next() {
            self.bind(params)?;
            self.conn.emit_trace(&self.sql);
            total += execute_step(self.conn, &mut self.stmt, &mut self.state)?;
        }
        Ok(total)
    }
}

impl std::fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
