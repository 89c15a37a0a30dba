//! Online copy of one connection's database into another.

use std::fmt;
use std::path::Path;

use rusqlite::DatabaseName;
use rusqlite::backup::{Backup, StepResult};

use crate::busy::BusyRetry;
use crate::config::{OpenOptions, Source};
use crate::connection::Connection;
use crate::error::DbError;

/// Pages copied per engine call unless configured otherwise.
pub const DEFAULT_PAGES_PER_STEP: i32 = 100;

/// Pages still to copy out of the source's total, reported after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupProgress {
    pub remaining: u32,
    pub total: u32,
}

type ProgressFn<'a> = Box<dyn FnMut(BackupProgress) + 'a>;

/// Options for [`Connection::backup`].
pub struct BackupOptions<'a> {
    source_schema: String,
    dest_schema: String,
    pages_per_step: i32,
    progress: Option<ProgressFn<'a>>,
}

impl Default for BackupOptions<'_> {
    fn default() -> Self {
        Self {
            source_schema: "main".into(),
            dest_schema: "main".into(),
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            progress: None,
        }
    }
}

impl<'a> BackupOptions<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source_schema(mut self, schema: impl Into<String>) -> Self {
        self.source_schema = schema.into();
        self
    }

    #[must_use]
    pub fn dest_schema(mut self, schema: impl Into<String>) -> Self {
        self.dest_schema = schema.into();
        self
    }

    /// Pages per batch; values below one copy everything in a single batch.
    #[must_use]
    pub fn pages_per_step(mut self, pages: i32) -> Self {
        self.pages_per_step = pages;
        self
    }

    #[must_use]
    pub fn progress(mut self, callback: impl FnMut(BackupProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for BackupOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupOptions")
            .field("source_schema", &self.source_schema)
            .field("dest_schema", &self.dest_schema)
            .field("pages_per_step", &self.pages_per_step)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

fn schema_name(schema: &str) -> DatabaseName<'_> {
    match schema {
        "main" => DatabaseName::Main,
        "temp" => DatabaseName::Temp,
        other => DatabaseName::Attached(other),
    }
}

impl Connection {
    /// Copy this connection's database into `dest`, batch by batch.
    ///
    /// The scheduler gets a yield between batches. Batches that find either
    /// database locked are retried under this connection's busy timeout.
    ///
    /// ```rust
    /// use coop_sqlite::prelude::*;
    ///
    /// # fn demo() -> Result<(), DbError> {
    /// let src = Connection::open_in_memory()?;
    /// src.execute("create table t (x); insert into t values (1), (2)", ())?;
    /// let mut dest = Connection::open_in_memory()?;
    /// let mut last = None;
    /// src.backup(&mut dest, BackupOptions::new().progress(|p| last = Some(p)))?;
    /// assert_eq!(last.map(|p| p.remaining), Some(0));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `DbError` if either connection is closed, a schema is unknown, the
    /// destination is not writable, or contention outlasts the busy timeout.
    pub fn backup(&self, dest: &mut Connection, mut options: BackupOptions<'_>) -> Result<(), DbError> {
        let source = self.handle()?;
        let target = dest.handle_mut()?;
        self.start_operation();
        let backup = Backup::new_with_names(
            source,
            schema_name(&options.source_schema),
            target,
            schema_name(&options.dest_schema),
        )
        .map_err(|e| self.fault(e))?;

        let scheduler = self.scheduler();
        let mut busy = BusyRetry::new(self.busy_timeout(), scheduler);
        let mut batches = 0_u32;

        loop {
            let step = backup
                .step(options.pages_per_step)
                .map_err(|e| self.fault(e))?;
            batches += 1;

            let progress = backup.progress();
            let report = BackupProgress {
                remaining: u32::try_from(progress.remaining).unwrap_or_default(),
                total: u32::try_from(progress.pagecount).unwrap_or_default(),
            };
            if let Some(callback) = options.progress.as_mut() {
                callback(report);
            }

            match step {
                StepResult::Done => {
                    tracing::debug!(batches, pages = report.total, "backup complete");
                    return Ok(());
                }
                StepResult::More => scheduler.yield_now(),
                StepResult::Busy | StepResult::Locked => {
                    busy.on_busy("database is locked during backup")
                        .map_err(|e| self.record(e))?;
                }
                other => {
                    return Err(self.record(DbError::SqlError {
                        code: rusqlite::ffi::SQLITE_ERROR,
                        message: format!("unexpected backup step result: {other:?}"),
                        offset: None,
                    }));
                }
            }
        }
    }

    /// Copy this connection's database into a file, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `DbError::OpenError` if the file cannot be opened, or any fault from
    /// [`backup`](Connection::backup).
    pub fn backup_to_path(&self, path: impl AsRef<Path>, options: BackupOptions<'_>) -> Result<(), DbError> {
        let mut dest = Connection::open(Source::from(path.as_ref()), OpenOptions::default())?;
        self.backup(&mut dest, options)?;
        dest.close()
    }
}
