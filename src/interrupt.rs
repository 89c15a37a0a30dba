use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DbError;

/// Engine VM instructions between progress checks of the interrupt flag.
pub const PROGRESS_CHECK_OPS: i32 = 100;

/// Cross-thread cancellation request for one connection.
///
/// Cloning shares the same flag. Setting it aborts whichever statement is stepping
/// on the connection at its next progress check; the flag is then cleared. A
/// request made while nothing is stepping is dropped when the next operation starts.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Request cancellation of the statement currently stepping.
    pub fn interrupt(&self) {
        tracing::debug!("interrupt requested");
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consume a pending request.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Closure installed as the engine progress handler; returning true aborts the step.
    pub(crate) fn progress_check(&self) -> impl FnMut() -> bool + Send + std::panic::RefUnwindSafe + 'static {
        let flag = Arc::clone(&self.flag);
        move || flag.load(Ordering::SeqCst)
    }

    /// The fault reported for an observed interrupt; clears the flag.
    pub(crate) fn observed(&self) -> DbError {
        self.take();
        DbError::InterruptError("statement was interrupted".into())
    }
}
