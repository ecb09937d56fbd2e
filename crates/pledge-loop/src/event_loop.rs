//! Single-threaded event loop with a microtask queue and virtual-clock timers
//!
//! Each turn of the loop drains the FIFO microtask queue completely, then
//! fires the earliest live timer, jumping the virtual clock straight to its
//! deadline. Nothing here blocks or sleeps; time only exists as far as the
//! timers say it does.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::config::LoopConfig;
use crate::error::LoopError;
use crate::handle::{TimerHandle, TimerId};
use crate::timer_wheel::{TimerEntry, TimerWheel};

/// Deferred unit of work queued with [`EventLoop::queue_microtask`]
pub type Microtask = Box<dyn FnOnce()>;

/// Smallest period accepted by `set_interval`; a zero period would keep the
/// clock from ever moving.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

thread_local! {
    static CURRENT: RefCell<Option<EventLoop>> = const { RefCell::new(None) };
}

/// Counters reported by `run` and `run_until`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Microtasks executed
    pub microtasks: u64,
    /// Timers fired
    pub timers: u64,
    /// Virtual time when the run returned
    pub now: Duration,
}

/// Handle to an event loop. Clones refer to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<Inner>,
}

struct Inner {
    config: LoopConfig,
    microtasks: RefCell<VecDeque<Microtask>>,
    timers: RefCell<TimerWheel>,
    now: Cell<Duration>,
    next_timer_id: Cell<u64>,
    running: Cell<bool>,
}

/// Clears the running flag even if a callback panics
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.inner.config.name)
            .field("now", &self.inner.now.get())
            .field("microtasks", &self.inner.microtasks.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .field("running", &self.inner.running.get())
            .finish()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

impl EventLoop {
    /// Create a new loop with its clock at zero
    pub fn new(config: LoopConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                microtasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(TimerWheel::new()),
                now: Cell::new(Duration::ZERO),
                next_timer_id: Cell::new(0),
                running: Cell::new(false),
            }),
        }
    }

    /// The loop current on this thread.
    ///
    /// Returns the loop installed by an enclosing [`EventLoop::enter`], or the
    /// thread's default loop, created on first use from `LoopConfig::from_env`.
    pub fn current() -> EventLoop {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(|| {
                    let config = LoopConfig::from_env().unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "invalid loop configuration, using defaults");
                        LoopConfig::default()
                    });
                    EventLoop::new(config)
                })
                .clone()
        })
    }

    /// Make this loop current while `f` runs
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<EventLoop>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                CURRENT.with(|current| *current.borrow_mut() = previous);
            }
        }

        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        let _restore = Restore(previous);
        f()
    }

    /// Loop configuration
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Check whether two handles refer to the same loop
    pub fn ptr_eq(&self, other: &EventLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    /// Whether `run`, `run_until` or `run_microtasks` is on the stack
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Number of live timers
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Virtual time the next live timer fires at
    pub fn next_timer_at(&self) -> Option<Duration> {
        self.inner.timers.borrow_mut().next_deadline()
    }

    /// True when `run` would return without doing anything
    pub fn is_idle(&self) -> bool {
        self.inner.microtasks.borrow().is_empty() && self.inner.timers.borrow().is_empty()
    }

    /// Queue `task` to run on a later turn, after every microtask already queued
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Schedule `callback` to fire once `delay` has elapsed on the virtual clock.
    ///
    /// Deadlines past the end of the clock are clamped to `Duration::MAX`.
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        let handle = self.next_handle();
        let when = self.now().saturating_add(delay);

        tracing::trace!(
            loop_name = %self.inner.config.name,
            timer_id = %handle.id(),
            at_ms = when.as_millis() as u64,
            "timer registered"
        );

        self.inner.timers.borrow_mut().register(
            when,
            TimerEntry {
                handle: handle.clone(),
                callback: Box::new(callback),
            },
        );
        handle
    }

    /// Fire `callback` every `period` until the returned handle is cancelled.
    ///
    /// The first call happens one period from now, not immediately. Periods
    /// shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn set_interval(&self, period: Duration, callback: impl FnMut() + 'static) -> TimerHandle {
        let handle = self.next_handle();
        let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(callback));
        arm_interval(
            Rc::downgrade(&self.inner),
            handle.clone(),
            period.max(MIN_INTERVAL),
            callback,
        );
        handle
    }

    /// Cancel a timer scheduled on this loop
    pub fn clear_timeout(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    fn next_handle(&self) -> TimerHandle {
        let id = self.inner.next_timer_id.get();
        self.inner.next_timer_id.set(id + 1);
        TimerHandle::new(TimerId(id))
    }

    /// Drain the microtask queue without touching timers.
    ///
    /// The loop is current while its microtasks run.
    pub fn run_microtasks(&self) -> Result<u64, LoopError> {
        let _guard = self.begin_run()?;
        self.enter(|| self.drain_microtasks())
    }

    /// Run until both the microtask queue and the timer wheel are empty.
    ///
    /// The loop is current for the whole run, so work scheduled from its
    /// callbacks lands back on it.
    pub fn run(&self) -> Result<RunStats, LoopError> {
        self.run_inner(None)
    }

    /// Run every timer due at or before `deadline`, then leave the clock at
    /// `deadline` (or where it already was, if later)
    pub fn run_until(&self, deadline: Duration) -> Result<RunStats, LoopError> {
        self.run_inner(Some(deadline))
    }

    fn run_inner(&self, deadline: Option<Duration>) -> Result<RunStats, LoopError> {
        let _guard = self.begin_run()?;
        self.enter(|| self.turns(deadline))
    }

    fn turns(&self, deadline: Option<Duration>) -> Result<RunStats, LoopError> {
        let mut stats = RunStats::default();

        tracing::debug!(
            loop_name = %self.inner.config.name,
            now_ms = self.now().as_millis() as u64,
            "event loop run started"
        );

        stats.microtasks += self.drain_microtasks()?;

        loop {
            let due = self.inner.timers.borrow_mut().pop_due(deadline);
            let Some((when, entry)) = due else { break };

            if when > self.now() {
                self.inner.now.set(when);
            }
            tracing::trace!(
                timer_id = %entry.handle.id(),
                now_ms = self.now().as_millis() as u64,
                "firing timer"
            );
            (entry.callback)();
            stats.timers += 1;

            stats.microtasks += self.drain_microtasks()?;
        }

        if let Some(deadline) = deadline {
            if deadline > self.now() {
                self.inner.now.set(deadline);
            }
        }
        stats.now = self.now();

        tracing::debug!(
            loop_name = %self.inner.config.name,
            microtasks = stats.microtasks,
            timers = stats.timers,
            now_ms = stats.now.as_millis() as u64,
            "event loop run finished"
        );
        Ok(stats)
    }

    fn begin_run(&self) -> Result<RunGuard<'_>, LoopError> {
        if self.inner.running.replace(true) {
            return Err(LoopError::Reentrant);
        }
        Ok(RunGuard(&self.inner.running))
    }

    fn drain_microtasks(&self) -> Result<u64, LoopError> {
        let budget = self.inner.config.max_microtasks_per_drain;
        let mut ran: u64 = 0;

        loop {
            let task = self.inner.microtasks.borrow_mut().pop_front();
            let Some(task) = task else { break };

            if ran as usize >= budget {
                // Put it back so the queue is left as the caller found it
                self.inner.microtasks.borrow_mut().push_front(task);
                tracing::warn!(
                    loop_name = %self.inner.config.name,
                    budget,
                    "microtask budget exceeded"
                );
                return Err(LoopError::MicrotaskBudgetExceeded { budget });
            }

            task();
            ran += 1;
        }

        if ran > 0 {
            tracing::trace!(microtasks = ran, "microtask queue drained");
        }
        Ok(ran)
    }
}

fn arm_interval(
    inner: Weak<Inner>,
    handle: TimerHandle,
    period: Duration,
    callback: Rc<RefCell<dyn FnMut()>>,
) {
    let Some(strong) = inner.upgrade() else { return };
    let when = strong.now.get().saturating_add(period);

    let rearm_handle = handle.clone();
    let fire = move || {
        (*callback.borrow_mut())();
        if !rearm_handle.is_cancelled() {
            arm_interval(inner, rearm_handle, period, callback);
        }
    };

    strong.timers.borrow_mut().register(
        when,
        TimerEntry {
            handle,
            callback: Box::new(fire),
        },
    );
}
