//! Convenient imports for common functionality.

pub use crate::params;
pub use crate::{
    BackupOptions, BackupProgress, Binary, Connection, DbError, HostValue, InterruptHandle,
    Materialized, OpenOptions, Params, PreparedStatement, ResultSet, ResultShape, Row, Scheduler,
    SchedulingLock, ThreadScheduler, TraceSink, TransactionMode, TxAbort, TxOutcome, Value,
};

#[cfg(feature = "worker")]
pub use crate::AsyncConnection;
