//! Task lifecycle signals.
//!
//! Hooks into the scheduler's task lifecycle for monitoring, logging and
//! instrumentation. Handlers run synchronously, in registration order, at
//! the moment the scheduler changes a task's state; timestamps are the
//! event loop's virtual time.
//!
//! # Example
//! ```rust
//! use pledge_tasks::{Scheduler, TaskSignal};
//!
//! let scheduler: Scheduler<&'static str> = Scheduler::new(2).unwrap();
//! scheduler.on_signal(|signal: &TaskSignal<'_, &'static str>| {
//!     if let TaskSignal::Failed { metadata, reason, .. } = signal {
//!         eprintln!("{} failed: {}", metadata, reason);
//!     }
//! });
//! ```

use pledge::Rejection;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::state::TaskState;
use crate::task::TaskId;

/// Task lifecycle signals
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskSignal<'a, M> {
    /// Task appended to the queue
    Queued {
        task_id: &'a TaskId,
        metadata: &'a M,
        at: Duration,
    },

    /// Task admitted to a slot, factory about to be invoked
    Started {
        task_id: &'a TaskId,
        metadata: &'a M,
        at: Duration,
    },

    /// Produced promise fulfilled
    Succeeded {
        task_id: &'a TaskId,
        metadata: &'a M,
        at: Duration,
    },

    /// Produced promise rejected
    Failed {
        task_id: &'a TaskId,
        metadata: &'a M,
        reason: &'a Rejection,
        at: Duration,
    },
}

impl<'a, M> TaskSignal<'a, M> {
    /// Get the signal type as a string
    pub fn signal_type(&self) -> &'static str {
        match self {
            TaskSignal::Queued { .. } => "queued",
            TaskSignal::Started { .. } => "started",
            TaskSignal::Succeeded { .. } => "succeeded",
            TaskSignal::Failed { .. } => "failed",
        }
    }

    /// State the task entered
    pub fn state(&self) -> TaskState {
        match self {
            TaskSignal::Queued { .. } => TaskState::Queued,
            TaskSignal::Started { .. } => TaskState::Running,
            TaskSignal::Succeeded { .. } => TaskState::Fulfilled,
            TaskSignal::Failed { .. } => TaskState::Rejected,
        }
    }

    pub fn task_id(&self) -> &'a TaskId {
        match self {
            TaskSignal::Queued { task_id, .. }
            | TaskSignal::Started { task_id, .. }
            | TaskSignal::Succeeded { task_id, .. }
            | TaskSignal::Failed { task_id, .. } => task_id,
        }
    }

    pub fn metadata(&self) -> &'a M {
        match self {
            TaskSignal::Queued { metadata, .. }
            | TaskSignal::Started { metadata, .. }
            | TaskSignal::Succeeded { metadata, .. }
            | TaskSignal::Failed { metadata, .. } => metadata,
        }
    }

    /// Virtual time of the transition
    pub fn at(&self) -> Duration {
        match self {
            TaskSignal::Queued { at, .. }
            | TaskSignal::Started { at, .. }
            | TaskSignal::Succeeded { at, .. }
            | TaskSignal::Failed { at, .. } => *at,
        }
    }
}

/// Handler for signals
pub trait SignalHandler<M> {
    /// Handle a signal
    fn handle(&self, signal: &TaskSignal<'_, M>);

    /// Filter which signals this handler receives
    /// Default: receive all signals
    fn accepts(&self, signal: &TaskSignal<'_, M>) -> bool {
        let _ = signal;
        true
    }
}

/// Function-based signal handler
pub struct FnHandler<F> {
    func: F,
    filter: Option<Vec<&'static str>>,
}

impl<F> FnHandler<F> {
    /// Create a new function handler
    pub fn new(func: F) -> Self {
        Self { func, filter: None }
    }

    /// Only handle specific signal types
    pub fn only(mut self, signal_types: Vec<&'static str>) -> Self {
        self.filter = Some(signal_types);
        self
    }
}

impl<M, F> SignalHandler<M> for FnHandler<F>
where
    F: Fn(&TaskSignal<'_, M>),
{
    fn handle(&self, signal: &TaskSignal<'_, M>) {
        (self.func)(signal);
    }

    fn accepts(&self, signal: &TaskSignal<'_, M>) -> bool {
        match &self.filter {
            Some(types) => types.contains(&signal.signal_type()),
            None => true,
        }
    }
}

/// Dispatcher for sending signals to handlers
pub struct SignalDispatcher<M> {
    handlers: RefCell<Vec<Rc<dyn SignalHandler<M>>>>,
}

impl<M> Default for SignalDispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SignalDispatcher<M> {
    /// Create a new signal dispatcher
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Register a handler for all signals
    pub fn register<H: SignalHandler<M> + 'static>(&self, handler: H) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    /// Dispatch a signal to all registered handlers.
    ///
    /// Handlers registered while dispatching see the next signal, not this one.
    pub fn dispatch(&self, signal: &TaskSignal<'_, M>) {
        let handlers: Vec<_> = self.handlers.borrow().iter().cloned().collect();
        for handler in handlers {
            if handler.accepts(signal) {
                handler.handle(signal);
            }
        }
    }

    /// Get number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}
