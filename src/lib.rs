//! SQLite query execution that cooperates with the threads around it.
//!
//! A [`Connection`] steps statements one engine step at a time. Between steps it
//! can hand the host scheduler back to other threads ([`Scheduler`],
//! [`SchedulingLock`]), retry lock contention under a timeout, and notice a
//! cancellation request set from another thread ([`InterruptHandle`]).
//!
//! ```rust
//! use coop_sqlite::prelude::*;
//!
//! # fn demo() -> Result<(), DbError> {
//! let conn = OpenOptions::builder()
//!     .busy_timeout(std::time::Duration::from_secs(5))
//!     .open(":memory:")?;
//! conn.execute("create table t (id integer primary key, name text)", ())?;
//! conn.batch_execute("insert into t (name) values (?)", vec![params!["a"], params!["b"]])?;
//! let names = conn.query_single_column("select name from t order by id", ())?;
//! assert_eq!(names, vec![Value::Text("a".into()), Value::Text("b".into())]);
//! # Ok(())
//! # }
//! ```

mod backup;
mod busy;
mod config;
mod connection;
mod error;
mod interrupt;
pub mod params;
pub mod prelude;
pub mod results;
mod schedule;
mod split;
mod statement;
mod transaction;
mod types;
#[cfg(feature = "worker")]
mod worker;

pub use backup::{BackupOptions, BackupProgress, DEFAULT_PAGES_PER_STEP};
pub use busy::BUSY_RETRY_INTERVAL;
pub use config::{DEFAULT_STATEMENT_CACHE_CAPACITY, OpenOptions, OpenOptionsBuilder, Source};
pub use connection::{Connection, ErrorSnapshot, TraceSink};
pub use error::DbError;
pub use interrupt::{InterruptHandle, PROGRESS_CHECK_OPS};
pub use params::{BindSlots, coerce};
pub use results::{Materialized, ResultSet, ResultShape, Row};
pub use schedule::{DEFAULT_YIELD_THRESHOLD, Scheduler, SchedulingGuard, SchedulingLock, ThreadScheduler};
pub use statement::{PreparedStatement, StepState};
pub use transaction::{TransactionMode, TxAbort, TxOutcome, rollback};
pub use types::{Binary, HostValue, Params, Value};
#[cfg(feature = "worker")]
pub use worker::AsyncConnection;
