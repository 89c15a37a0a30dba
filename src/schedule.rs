use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Steps between cooperative yields unless configured otherwise.
pub const DEFAULT_YIELD_THRESHOLD: u32 = 1000;

/// The host's "let other ready work run now" primitive.
///
/// The stepping loop calls `yield_now` every `yield_threshold` engine steps, and the
/// busy controller calls `sleep` between contention retries.
pub trait Scheduler: Send + Sync {
    /// Release the host scheduling lock, let other ready threads run, reacquire it.
    fn yield_now(&self);

    /// Sleep without holding the host scheduling lock.
    fn sleep(&self, duration: Duration);
}

/// Plain OS threads: no shared lock, yielding just hints the OS scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn yield_now(&self) {
        thread::yield_now();
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    waiting: usize,
    generation: u64,
}

/// A process-wide cooperative scheduling lock.
///
/// Only the thread holding the lock runs host-level logic. Threads that execute
/// queries while holding it release it periodically (see [`Scheduler::yield_now`]);
/// when another thread is waiting, the lock is handed to that thread before the
/// yielding thread takes it back.
///
/// ```rust
/// use std::sync::Arc;
/// use coop_sqlite::prelude::*;
///
/// # fn demo() -> Result<(), DbError> {
/// let lock = SchedulingLock::new();
/// let options = OpenOptions::builder()
///     .scheduler(lock.clone() as Arc<dyn Scheduler>)
///     .finish();
/// let conn = Connection::open(":memory:", options)?;
/// let _guard = lock.acquire();
/// conn.query("select 1", ())?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SchedulingLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl SchedulingLock {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block until the current thread owns the lock.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> SchedulingGuard {
        let me = thread::current().id();
        let mut state = self.state();
        state.waiting += 1;
        while state.owner.is_some() {
            state = self.wait(state);
        }
        Self::take(&mut state, me);
        SchedulingGuard {
            lock: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state().owner == Some(thread::current().id())
    }

    /// Run `f` with the lock released, if the current thread holds it.
    pub fn without_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let me = thread::current().id();
        let (had_waiters, generation) = {
            let mut state = self.state();
            if state.owner != Some(me) {
                drop(state);
                return f();
            }
            state.owner = None;
            (state.waiting > 0, state.generation)
        };
        self.changed.notify_all();

        let out = f();

        let mut state = self.state();
        state.waiting += 1;
        // Hand off: a thread that was already waiting gets the lock before we retake it.
        while state.owner.is_some() || (had_waiters && state.generation == generation) {
            state = self.wait(state);
        }
        Self::take(&mut state, me);
        out
    }

    fn take(state: &mut LockState, me: ThreadId) {
        state.waiting -= 1;
        state.owner = Some(me);
        state.generation = state.generation.wrapping_add(1);
    }

    fn release(&self) {
        let mut state = self.state();
        state.owner = None;
        drop(state);
        self.changed.notify_all();
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SchedulingLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SchedulingLock")
            .field("owner", &state.owner)
            .field("waiting", &state.waiting)
            .finish()
    }
}

impl Scheduler for SchedulingLock {
    fn yield_now(&self) {
        self.without_lock(thread::yield_now);
    }

    fn sleep(&self, duration: Duration) {
        self.without_lock(|| thread::sleep(duration));
    }
}

/// Ownership of a [`SchedulingLock`]; released on drop.
#[derive(Debug)]
pub struct SchedulingGuard {
    lock: Arc<SchedulingLock>,
}

impl Drop for SchedulingGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Counts completed engine steps and yields to the scheduler every `threshold` steps.
///
/// A threshold of zero never yields.
pub(crate) struct YieldController<'a> {
    threshold: u32,
    counter: u32,
    scheduler: &'a dyn Scheduler,
}

impl<'a> YieldController<'a> {
    pub(crate) fn new(threshold: u32, scheduler: &'a dyn Scheduler) -> Self {
        Self {
            threshold,
            counter: 0,
            scheduler,
        }
    }

    pub(crate) fn step_completed(&mut self) {
        if self.threshold == 0 {
            return;
        }
        self.counter += 1;
        if self.counter >= self.threshold {
            tracing::trace!(threshold = self.threshold, "yielding scheduling lock");
            self.scheduler.yield_now();
            self.counter = 0;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records yields and sleeps instead of performing them.
    #[derive(Debug, Default)]
    pub(crate) struct CountingScheduler {
        pub(crate) yields: AtomicUsize,
        pub(crate) sleeps: Mutex<Vec<Duration>>,
    }

    impl Scheduler for CountingScheduler {
        fn yield_now(&self) {
            self.yields.fetch_add(1, Ordering::SeqCst);
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(duration);
        }
    }

    #[test]
    fn yields_every_threshold_steps() {
        let sched = CountingScheduler::default();
        let mut ctl = YieldController::new(3, &sched);
        for _ in 0..10 {
            ctl.step_completed();
        }
        assert_eq!(sched.yields.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_threshold_never_yields() {
        let sched = CountingScheduler::default();
        let mut ctl = YieldController::new(0, &sched);
        for _ in 0..10_000 {
            ctl.step_completed();
        }
        assert_eq!(sched.yields.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let lock = SchedulingLock::new();
        {
            let _guard = lock.acquire();
            assert!(lock.is_held_by_current_thread());
        }
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn yielding_hands_the_lock_to_a_waiter() {
        let lock = SchedulingLock::new();
        let guard = lock.acquire();
        let ran = Arc::new(AtomicBool::new(false));

        let waiter = {
            let lock = Arc::clone(&lock);
            let ran = Arc::clone(&ran);
            thread::spawn(move || {
                let _g = lock.acquire();
                ran.store(true, Ordering::SeqCst);
            })
        };

        // Wait until the other thread is blocked on the lock.
        while lock.state().waiting == 0 {
            thread::yield_now();
        }
        lock.yield_now();
        assert!(ran.load(Ordering::SeqCst));
        assert!(lock.is_held_by_current_thread());
        drop(guard);
        waiter.join().unwrap();
    }

    #[test]
    fn without_lock_is_transparent_for_non_holders() {
        let lock = SchedulingLock::new();
        assert_eq!(lock.without_lock(|| 7), 7);
        assert!(!lock.is_held_by_current_thread());
    }
}
