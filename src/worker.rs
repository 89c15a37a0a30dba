//! A connection owned by a dedicated thread and driven from async code.

mod channel;
mod dispatcher;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tokio::sync::oneshot;

use crate::config::{OpenOptions, Source};
use crate::connection::Connection;
use crate::error::DbError;
use crate::interrupt::InterruptHandle;
use crate::results::{Materialized, ResultSet, ResultShape};
use crate::types::Params;

use channel::{BoxedCallback, Command};
use dispatcher::run_worker;

/// Async handle to a [`Connection`] living on its own thread.
///
/// Commands run one at a time, in the order they were sent. Clones share the
/// worker; it shuts down, closing the connection, when the last clone is dropped.
///
/// ```rust,no_run
/// use coop_sqlite::prelude::*;
///
/// # async fn demo() -> Result<(), DbError> {
/// let conn = AsyncConnection::open(":memory:", OpenOptions::default())?;
/// conn.execute("create table t (x)", ()).await?;
/// conn.batch_execute("insert into t values (?)", vec![params![1], params![2]]).await?;
/// let rows = conn.query("select x from t", ()).await?;
/// assert_eq!(rows.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AsyncConnection {
    worker: Arc<Worker>,
    interrupt: InterruptHandle,
}

impl AsyncConnection {
    /// Open a connection and move it onto a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns `DbError::OpenError` if the source cannot be opened, or
    /// `DbError::WorkerError` if the thread cannot be spawned.
    pub fn open(source: impl Into<Source>, options: OpenOptions) -> Result<Self, DbError> {
        Self::new(Connection::open(source, options)?)
    }

    /// Move an open connection onto a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns `DbError::WorkerError` if the thread cannot be spawned.
    pub fn new(conn: Connection) -> Result<Self, DbError> {
        let interrupt = conn.interrupt_handle();
        let worker = Worker::spawn(conn)?;
        Ok(Self {
            worker: Arc::new(worker),
            interrupt,
        })
    }

    /// Every row as a column mapping.
    ///
    /// # Errors
    ///
    /// Returns the connection's fault, or `DbError::WorkerError` if the worker is gone.
    pub async fn query(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<ResultSet, DbError> {
        match self
            .query_as(ResultShape::RowMapping, sql, params)
            .await?
        {
            Materialized::Rows(rows) => Ok(rows),
            other => Err(DbError::WorkerError(format!(
                "unexpected result shape {:?}",
                other.shape()
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns the connection's fault, or `DbError::WorkerError` if the worker is gone.
    pub async fn query_as(
        &self,
        shape: ResultShape,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Materialized, DbError> {
        let (tx, rx) = oneshot::channel();
        self.worker.send_command(Command::Query {
            sql: sql.into(),
            params: params.into(),
            shape,
            respond_to: tx,
        })?;
        rx.await.map_err(|_| dropped("query"))?
    }

    /// # Errors
    ///
    /// Returns the connection's fault, or `DbError::WorkerError` if the worker is gone.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<usize, DbError> {
        let (tx, rx) = oneshot::channel();
        self.worker.send_command(Command::Execute {
            sql: sql.into(),
            params: params.into(),
            respond_to: tx,
        })?;
        rx.await.map_err(|_| dropped("execute"))?
    }

    /// Run one statement per parameter set; stops at the first failing set.
    ///
    /// # Errors
    ///
    /// Returns the first fault, or `DbError::WorkerError` if the worker is gone.
    pub async fn batch_execute(
        &self,
        sql: impl Into<String>,
        sets: Vec<Params>,
    ) -> Result<usize, DbError> {
        let (tx, rx) = oneshot::channel();
        self.worker.send_command(Command::BatchExecute {
            sql: sql.into(),
            sets,
            respond_to: tx,
        })?;
        rx.await.map_err(|_| dropped("batch execute"))?
    }

    /// Run synchronous logic against the worker-owned connection, for example a
    /// whole [`Connection::transaction`].
    ///
    /// # Errors
    ///
    /// Returns the callback's fault, or `DbError::WorkerError` if the worker is gone.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let callback: BoxedCallback =
            Box::new(move |conn| func(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.worker.send_command(Command::WithConnection {
            callback,
            respond_to: tx,
        })?;
        match rx.await {
            Ok(Ok(payload)) => payload
                .downcast::<R>()
                .map(|boxed| *boxed)
                .map_err(|_| DbError::WorkerError("worker response downcast failure".into())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(dropped("connection callback")),
        }
    }

    /// Close the connection; later commands fail with `DbError::ClosedError`.
    ///
    /// # Errors
    ///
    /// Returns the engine fault if the handle refuses to close.
    pub async fn close(&self) -> Result<(), DbError> {
        let (tx, rx) = oneshot::channel();
        self.worker.send_command(Command::Close { respond_to: tx })?;
        rx.await.map_err(|_| dropped("close"))?
    }

    /// Cancel the statement the worker is stepping, without waiting for it.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }
}

impl fmt::Debug for AsyncConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncConnection")
            .field("source", &self.worker.source)
            .finish_non_exhaustive()
    }
}

fn dropped(operation: &str) -> DbError {
    DbError::WorkerError(format!("worker dropped while handling {operation}"))
}

struct Worker {
    sender: Sender<Command>,
    source: Source,
}

impl Worker {
    fn spawn(conn: Connection) -> Result<Self, DbError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let source = conn.source().clone();
        thread::Builder::new()
            .name(format!("coop-sqlite-worker-{source}"))
            .spawn(move || run_worker(conn, &receiver))
            .map_err(|err| DbError::WorkerError(format!("failed to spawn worker thread: {err}")))?;
        tracing::debug!(%source, "spawned worker");
        Ok(Self { sender, source })
    }

    fn send_command(&self, command: Command) -> Result<(), DbError> {
        self.sender
            .send(command)
            .map_err(|_| DbError::WorkerError("worker closed".into()))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}
