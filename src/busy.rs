use std::time::{Duration, Instant};

use crate::error::DbError;
use crate::schedule::Scheduler;

/// Longest single sleep between contention retries.
pub const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Retry budget for one operation that hit lock contention.
///
/// * no timeout: a single attempt, contention surfaces immediately;
/// * zero timeout: one immediate retry, no sleeping;
/// * otherwise: retry, sleeping cooperatively, until the deadline passes.
pub(crate) struct BusyRetry<'a> {
    timeout: Option<Duration>,
    started: Instant,
    retries: u32,
    scheduler: &'a dyn Scheduler,
}

impl<'a> BusyRetry<'a> {
    pub(crate) fn new(timeout: Option<Duration>, scheduler: &'a dyn Scheduler) -> Self {
        Self {
            timeout,
            started: Instant::now(),
            retries: 0,
            scheduler,
        }
    }

    /// Called after the engine reported contention.
    ///
    /// Returns `Ok(())` when the caller should try again, or the `BusyError` to surface.
    pub(crate) fn on_busy(&mut self, message: &str) -> Result<(), DbError> {
        let Some(timeout) = self.timeout else {
            return Err(DbError::BusyError(message.to_string()));
        };

        if timeout.is_zero() {
            if self.retries == 0 {
                self.retries += 1;
                return Ok(());
            }
            return Err(self.exhausted(message));
        }

        let elapsed = self.started.elapsed();
        if elapsed >= timeout {
            return Err(self.exhausted(message));
        }
        let pause = (timeout - elapsed).min(BUSY_RETRY_INTERVAL);
        self.retries += 1;
        tracing::debug!(retry = self.retries, ?pause, "database busy, retrying");
        self.scheduler.sleep(pause);
        Ok(())
    }

    fn exhausted(&self, message: &str) -> DbError {
        tracing::debug!(retries = self.retries, timeout = ?self.timeout, "busy timeout exceeded");
        DbError::BusyError(message.to_string())
    }

    #[cfg(test)]
    pub(crate) fn retries(&self) -> u32 {
        self.retries
    }
}
