use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::Connection;
use crate::error::DbError;
use crate::schedule::Scheduler;

/// Prepared statements kept compiled per connection unless configured otherwise.
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Where a connection's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Memory,
    Path(PathBuf),
}

impl Source {
    #[must_use]
    pub fn is_memory(&self) -> bool {
        matches!(self, Source::Memory)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Memory => f.write_str(":memory:"),
            Source::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        if location.is_empty() || location == ":memory:" {
            Source::Memory
        } else {
            Source::Path(PathBuf::from(location))
        }
    }
}

impl From<String> for Source {
    fn from(location: String) -> Self {
        Source::from(location.as_str())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&PathBuf> for Source {
    fn from(path: &PathBuf) -> Self {
        Source::Path(path.clone())
    }
}

/// Options for opening a [`Connection`].
#[derive(Clone)]
pub struct OpenOptions {
    pub read_only: bool,
    /// Contention-retry budget; `None` surfaces contention immediately.
    pub busy_timeout: Option<Duration>,
    /// Steps between cooperative yields; `None` uses the default.
    pub yield_threshold: Option<u32>,
    /// Where yields and busy sleeps go; `None` uses plain thread yields.
    pub scheduler: Option<Arc<dyn Scheduler>>,
    /// Switch the journal to WAL after opening (ignored for read-only and in-memory).
    pub wal: bool,
    pub statement_cache_capacity: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            busy_timeout: None,
            yield_threshold: None,
            scheduler: None,
            wal: false,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl OpenOptions {
    #[must_use]
    pub fn builder() -> OpenOptionsBuilder {
        OpenOptionsBuilder::new()
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("read_only", &self.read_only)
            .field("busy_timeout", &self.busy_timeout)
            .field("yield_threshold", &self.yield_threshold)
            .field("scheduler", &self.scheduler.as_ref().map(|_| "custom"))
            .field("wal", &self.wal)
            .field("statement_cache_capacity", &self.statement_cache_capacity)
            .finish()
    }
}

/// Fluent builder for [`OpenOptions`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptionsBuilder {
    opts: OpenOptions,
}

impl OpenOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn yield_threshold(mut self, threshold: u32) -> Self {
        self.opts.yield_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.opts.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn finish(self) -> OpenOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    ///
    /// Returns `DbError::OpenError` if the source cannot be opened.
    pub fn open(self, source: impl Into<Source>) -> Result<Connection, DbError> {
        Connection::open(source, self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sources() {
        assert!(Source::from("").is_memory());
        assert!(Source::from(":memory:").is_memory());
        assert_eq!(
            Source::from("data.db"),
            Source::Path(PathBuf::from("data.db"))
        );
        assert_eq!(Source::Memory.to_string(), ":memory:");
    }

    #[test]
    fn builder_sets_every_field() {
        let opts = OpenOptions::builder()
            .read_only(true)
            .busy_timeout(Duration::from_millis(250))
            .yield_threshold(0)
            .wal(true)
            .statement_cache_capacity(8)
            .finish();
        assert!(opts.read_only);
        assert_eq!(opts.busy_timeout, Some(Duration::from_millis(250)));
        assert_eq!(opts.yield_threshold, Some(0));
        assert!(opts.wal);
        assert_eq!(opts.statement_cache_capacity, 8);
        assert!(opts.scheduler.is_none());
    }
}
