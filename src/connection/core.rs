use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{OpenFlags, Statement};

use crate::config::{OpenOptions, Source};
use crate::error::{DbError, is_contention};
use crate::interrupt::{InterruptHandle, PROGRESS_CHECK_OPS};
use crate::schedule::{DEFAULT_YIELD_THRESHOLD, Scheduler, ThreadScheduler};
use crate::split::StatementCursor;
use crate::statement::StepState;
use crate::types::{HostValue, Params};

/// Receives the text of every statement just before it runs.
pub type TraceSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Detail of the most recent engine-reported fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSnapshot {
    pub code: i32,
    pub message: String,
    pub offset: Option<usize>,
}

/// A single database connection.
///
/// `Send` but not `Sync`: a connection steps one statement at a time, on whichever
/// thread owns it. Use [`Connection::interrupt_handle`] to cancel from elsewhere.
pub struct Connection {
    pub(crate) db: Option<rusqlite::Connection>,
    source: Source,
    read_only: bool,
    busy_timeout: Cell<Option<Duration>>,
    yield_threshold: Cell<u32>,
    trace: RefCell<Option<TraceSink>>,
    last_error: RefCell<Option<ErrorSnapshot>>,
    interrupt: InterruptHandle,
    scheduler: Arc<dyn Scheduler>,
}

fn open_error(source: &Source, err: &rusqlite::Error) -> DbError {
    DbError::OpenError {
        location: source.to_string(),
        message: err.to_string(),
    }
}

/// Read the schema so a non-database file fails now rather than on first use.
/// Contention here is not a failure.
fn read_schema(db: &rusqlite::Connection, source: &Source) -> Result<(), DbError> {
    match db.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(())) {
        Ok(()) => Ok(()),
        Err(err) if is_contention(&err) => {
            tracing::debug!(%source, "schema read hit contention");
            Ok(())
        }
        Err(err) => Err(open_error(source, &err)),
    }
}

impl Connection {
    /// Open a connection.
    ///
    /// `":memory:"` or an empty string opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::OpenError` if the source cannot be opened or is not a database.
    pub fn open(source: impl Into<Source>, options: OpenOptions) -> Result<Self, DbError> {
        let source = source.into();
        let read_only = options.read_only;
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        flags |= if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };

        let db = match &source {
            Source::Memory => rusqlite::Connection::open_in_memory_with_flags(flags),
            Source::Path(path) => rusqlite::Connection::open_with_flags(path, flags),
        }
        .map_err(|e| open_error(&source, &e))?;

        // Contention is retried at step level, never inside the engine.
        db.busy_handler(None).map_err(|e| open_error(&source, &e))?;
        db.set_prepared_statement_cache_capacity(options.statement_cache_capacity);

        let interrupt = InterruptHandle::default();
        db.progress_handler(PROGRESS_CHECK_OPS, Some(interrupt.progress_check()));

        read_schema(&db, &source)?;

        if options.wal && !read_only && !source.is_memory() {
            db.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| open_error(&source, &e))?;
        }

        tracing::debug!(%source, read_only, "opened connection");

        Ok(Self {
            db: Some(db),
            source,
            read_only,
            busy_timeout: Cell::new(options.busy_timeout),
            yield_threshold: Cell::new(options.yield_threshold.unwrap_or(DEFAULT_YIELD_THRESHOLD)),
            trace: RefCell::new(None),
            last_error: RefCell::new(None),
            interrupt,
            scheduler: options
                .scheduler
                .unwrap_or_else(|| Arc::new(ThreadScheduler)),
        })
    }

    /// Open a private in-memory database with default options.
    ///
    /// # Errors
    ///
    /// Returns `DbError::OpenError` if the engine cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::open(Source::Memory, OpenOptions::default())
    }

    /// Finalize cached statements and release the handle. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the engine fault if the handle refuses to close; the connection then
    /// stays open.
    pub fn close(&mut self) -> Result<(), DbError> {
        let Some(db) = self.db.take() else {
            return Ok(());
        };
        db.flush_prepared_statement_cache();
        match db.close() {
            Ok(()) => {
                tracing::debug!(source = %self.source, "closed connection");
                Ok(())
            }
            Err((db, err)) => {
                self.db = Some(db);
                Err(self.fault(err))
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.db.is_none()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    pub(crate) fn handle(&self) -> Result<&rusqlite::Connection, DbError> {
        self.db.as_ref().ok_or(DbError::ClosedError)
    }

    pub(crate) fn handle_mut(&mut self) -> Result<&mut rusqlite::Connection, DbError> {
        self.db.as_mut().ok_or(DbError::ClosedError)
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout.get()
    }

    /// Contention-retry budget for operations issued from now on.
    pub fn set_busy_timeout(&self, timeout: Option<Duration>) {
        self.busy_timeout.set(timeout);
    }

    #[must_use]
    pub fn yield_threshold(&self) -> u32 {
        self.yield_threshold.get()
    }

    /// Steps between cooperative yields. Nil restores the default; zero never yields.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ArgumentError` for negative or non-integer values.
    pub fn set_yield_threshold(&self, threshold: impl Into<HostValue>) -> Result<(), DbError> {
        let threshold = match threshold.into() {
            HostValue::Nil => DEFAULT_YIELD_THRESHOLD,
            HostValue::Integer(n) => u32::try_from(n).map_err(|_| {
                DbError::ArgumentError(format!("yield threshold must be non-negative, got {n}"))
            })?,
            HostValue::BigInteger(n) => u32::try_from(n).map_err(|_| {
                DbError::ArgumentError(format!("yield threshold out of range: {n}"))
            })?,
            other => {
                return Err(DbError::ArgumentError(format!(
                    "yield threshold must be an integer, got {}",
                    other.type_name()
                )));
            }
        };
        self.yield_threshold.set(threshold);
        Ok(())
    }

    pub(crate) fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Install or remove the trace sink.
    pub fn trace(&self, sink: Option<TraceSink>) {
        *self.trace.borrow_mut() = sink;
    }

    pub(crate) fn emit_trace(&self, sql: &str) {
        let sink = self.trace.borrow().clone();
        if let Some(sink) = sink {
            sink(sql.trim());
        }
    }

    /// Cancel whatever statement is stepping on this connection.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    /// A cloneable handle that can interrupt this connection from any thread.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Drop an interrupt requested while nothing was stepping, so it cannot cancel
    /// the operation that starts now.
    pub(crate) fn start_operation(&self) {
        if self.interrupt.take() {
            tracing::debug!(source = %self.source, "discarding interrupt requested while idle");
        }
    }

    pub(crate) fn interrupt_flag(&self) -> &InterruptHandle {
        &self.interrupt
    }

    /// Rows changed by writes since the connection opened.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ClosedError` after close.
    pub fn total_changes(&self) -> Result<u64, DbError> {
        Ok(self.handle()?.total_changes())
    }

    /// Rows changed by the most recent completed write statement.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ClosedError` after close.
    pub fn changes(&self) -> Result<usize, DbError> {
        let changes = self.handle()?.changes();
        Ok(usize::try_from(changes).unwrap_or(usize::MAX))
    }

    /// # Errors
    ///
    /// Returns `DbError::ClosedError` after close.
    pub fn last_insert_rowid(&self) -> Result<i64, DbError> {
        Ok(self.handle()?.last_insert_rowid())
    }

    /// Whether a transaction is open, however it was started.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ClosedError` after close.
    pub fn transaction_active(&self) -> Result<bool, DbError> {
        Ok(!self.handle()?.is_autocommit())
    }

    /// Code of the most recent engine fault, 0 if none.
    #[must_use]
    pub fn errcode(&self) -> i32 {
        self.last_error.borrow().as_ref().map_or(0, |e| e.code)
    }

    #[must_use]
    pub fn errmsg(&self) -> String {
        self.last_error
            .borrow()
            .as_ref()
            .map_or_else(|| "not an error".to_string(), |e| e.message.clone())
    }

    /// Byte offset of the most recent compile fault, when the engine located it.
    #[must_use]
    pub fn error_offset(&self) -> Option<usize> {
        self.last_error.borrow().as_ref().and_then(|e| e.offset)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<ErrorSnapshot> {
        self.last_error.borrow().clone()
    }

    /// Translate an engine fault and remember it.
    pub(crate) fn fault(&self, err: rusqlite::Error) -> DbError {
        self.record(DbError::from(err))
    }

    /// Remember an engine-coded fault; clears the interrupt flag once cancellation
    /// has been reported.
    pub(crate) fn record(&self, err: DbError) -> DbError {
        if err.is_interrupt() {
            self.interrupt.take();
        }
        if let Some(code) = err.code() {
            let message = match &err {
                DbError::SqlError { message, .. }
                | DbError::BusyError(message)
                | DbError::InterruptError(message) => message.clone(),
                other => other.to_string(),
            };
            *self.last_error.borrow_mut() = Some(ErrorSnapshot {
                code,
                message,
                offset: err.offset(),
            });
        }
        err
    }

    /// Run every statement in `sql` left to right.
    ///
    /// Leading statements run to completion with every slot NULL; `params` bind to
    /// the last one, which `last` then drives. Returns `None` when `sql` holds no
    /// statement.
    pub(crate) fn run_chain<T, F>(
        &self,
        sql: &str,
        params: Params,
        last: F,
    ) -> Result<Option<T>, DbError>
    where
        F: FnOnce(&Self, &mut Statement<'_>, &mut StepState) -> Result<T, DbError>,
    {
        let db = self.handle()?;
        self.start_operation();
        let mut cursor = StatementCursor::new(sql);
        loop {
            let Some((text, mut stmt)) = cursor
                .next_statement(|candidate| db.prepare_cached(candidate))
                .map_err(|e| self.record(e))?
            else {
                return Ok(None);
            };
            let mut state = StepState::default();

            if cursor.is_finished() {
                crate::params::bind(&mut stmt, &params).map_err(|e| self.record(e))?;
                self.emit_trace(text);
                return last(self, &mut *stmt, &mut state).map(Some);
            }

            crate::params::bind(&mut stmt, &Params::default()).map_err(|e| self.record(e))?;
            self.emit_trace(text);
            crate::results::materialize::discard(self, &mut *stmt, &mut state)?;
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("source", &self.source)
            .field("read_only", &self.read_only)
            .field("closed", &self.is_closed())
            .field("busy_timeout", &self.busy_timeout.get())
            .field("yield_threshold", &self.yield_threshold.get())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(source = %self.source, error = %err, "failed to close connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yield_threshold_accepts_nil_and_non_negative_integers() {
        let conn = Connection::open_in_memory().unwrap();
        conn.set_yield_threshold(5).unwrap();
        assert_eq!(conn.yield_threshold(), 5);
        conn.set_yield_threshold(()).unwrap();
        assert_eq!(conn.yield_threshold(), DEFAULT_YIELD_THRESHOLD);
        conn.set_yield_threshold(0).unwrap();
        assert_eq!(conn.yield_threshold(), 0);
    }

    #[test]
    fn yield_threshold_rejects_other_values() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            conn.set_yield_threshold(-1),
            Err(DbError::ArgumentError(_))
        ));
        match conn.set_yield_threshold("often") {
            Err(DbError::ArgumentError(msg)) => assert!(msg.contains("string")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(conn.yield_threshold(), DEFAULT_YIELD_THRESHOLD);
    }

    #[test]
    fn compile_offsets_are_relative_to_whole_text() {
        let conn = Connection::open_in_memory().unwrap();
        let sql = "select 1; select * frm t";
        let err = conn.execute(sql, ()).unwrap_err();
        let offset = err.offset().expect("offset");
        assert!(offset >= 10, "offset {offset} should point into the second statement");
        assert_eq!(conn.error_offset(), Some(offset));
        assert_eq!(conn.errcode(), err.code().unwrap());
    }

    #[test]
    fn errmsg_defaults_to_not_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(conn.errcode(), 0);
        assert_eq!(conn.errmsg(), "not an error");
        assert_eq!(conn.error_offset(), None);
    }
}
