//! Bounded FIFO scheduler for promise-producing tasks

use pledge::{Promise, Rejection, Resolution};
use pledge_loop::EventLoop;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::signals::{FnHandler, SignalDispatcher, SignalHandler, TaskSignal};
use crate::state::TaskState;
use crate::task::TaskId;

/// Invokes the task factory and reports its outcome as a unit promise
type Launch = Box<dyn FnOnce() -> Promise<()>>;

struct QueuedTask<M> {
    id: TaskId,
    metadata: Rc<M>,
    launch: Launch,
}

/// Runs queued tasks in `add` order with at most `limit` in flight.
///
/// `add` only queues. `start` fills the free slots; after that every
/// settlement frees a slot and admits the next queued task. A failing task
/// frees its slot like a successful one.
pub struct Scheduler<M = ()> {
    inner: Rc<Inner<M>>,
}

struct Inner<M> {
    config: SchedulerConfig,
    event_loop: EventLoop,
    queue: RefCell<VecDeque<QueuedTask<M>>>,
    running: Cell<usize>,
    signals: SignalDispatcher<M>,
}

impl<M> Clone for Scheduler<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for Scheduler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.inner.config.name)
            .field("limit", &self.inner.config.limit)
            .field("running", &self.inner.running.get())
            .field("queued", &self.inner.queue.borrow().len())
            .field("handlers", &self.inner.signals.handler_count())
            .finish()
    }
}

impl<M: 'static> Scheduler<M> {
    /// Create a scheduler on the current loop with the given ceiling
    pub fn new(limit: usize) -> Result<Self, SchedulerError> {
        Self::with_config(SchedulerConfig {
            limit,
            ..SchedulerConfig::default()
        })
    }

    /// Create a scheduler on the current loop
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        tracing::debug!(scheduler = %config.name, limit = config.limit, "scheduler created");

        Ok(Self {
            inner: Rc::new(Inner {
                config,
                event_loop: EventLoop::current(),
                queue: RefCell::new(VecDeque::new()),
                running: Cell::new(0),
                signals: SignalDispatcher::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Concurrency ceiling
    pub fn limit(&self) -> usize {
        self.inner.config.limit
    }

    /// Tasks currently holding a slot
    pub fn running(&self) -> usize {
        self.inner.running.get()
    }

    /// Tasks waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// Register a lifecycle signal handler
    pub fn on_signal<F>(&self, handler: F)
    where
        F: Fn(&TaskSignal<'_, M>) + 'static,
    {
        self.inner.signals.register(FnHandler::new(handler));
    }

    /// Register a lifecycle signal handler implementing [`SignalHandler`]
    pub fn register_handler<H: SignalHandler<M> + 'static>(&self, handler: H) {
        self.inner.signals.register(handler);
    }

    /// Queue a task. It does not run until [`Scheduler::start`] or a
    /// running task settling frees a slot for it.
    ///
    /// The returned promise settles like the promise `factory` produces.
    pub fn add<T, F>(&self, factory: F, metadata: M) -> Promise<T>
    where
        T: Clone + 'static,
        F: FnOnce() -> Promise<T> + 'static,
    {
        let (completion, resolver) = Promise::pending_in(&self.inner.event_loop);
        let launch: Launch = Box::new(move || {
            let produced = factory();
            resolver.resolve(&produced);
            produced.map(|_| ())
        });

        let task = QueuedTask {
            id: TaskId::new(),
            metadata: Rc::new(metadata),
            launch,
        };
        tracing::debug!(
            scheduler = %self.inner.config.name,
            task_id = %task.id,
            queued = self.queued() + 1,
            "task queued"
        );
        self.inner.signals.dispatch(&TaskSignal::Queued {
            task_id: &task.id,
            metadata: task.metadata.as_ref(),
            at: self.inner.event_loop.now(),
        });
        self.inner.queue.borrow_mut().push_back(task);

        completion
    }

    /// Fill every free slot from the head of the queue
    pub fn start(&self) {
        tracing::debug!(
            scheduler = %self.inner.config.name,
            limit = self.limit(),
            queued = self.queued(),
            "scheduler starting"
        );
        for _ in 0..self.limit() {
            self.pull();
        }
    }

    /// Admit the head of the queue if a slot is free
    fn pull(&self) {
        if self.running() >= self.limit() {
            return;
        }
        let task = self.inner.queue.borrow_mut().pop_front();
        let Some(QueuedTask { id, metadata, launch }) = task else {
            return;
        };

        self.transition(
            TaskState::Queued,
            &TaskSignal::Started {
                task_id: &id,
                metadata: metadata.as_ref(),
                at: self.inner.event_loop.now(),
            },
        );
        tracing::debug!(
            scheduler = %self.inner.config.name,
            task_id = %id,
            running = self.running(),
            "task started"
        );

        let settled = launch();

        let (on_ok, on_err) = (self.clone(), self.clone());
        let (ok_id, ok_metadata) = (id.clone(), Rc::clone(&metadata));
        settled.then(
            move |()| {
                on_ok.finish(ok_id, ok_metadata, Ok(()));
                Ok(Resolution::Value(()))
            },
            move |reason| {
                on_err.finish(id, metadata, Err(reason));
                Ok(Resolution::Value(()))
            },
        );
    }

    /// Release the slot of a settled task and admit the next one
    fn finish(&self, id: TaskId, metadata: Rc<M>, outcome: Result<(), Rejection>) {
        let at = self.inner.event_loop.now();

        match &outcome {
            Ok(()) => {
                self.transition(
                    TaskState::Running,
                    &TaskSignal::Succeeded {
                        task_id: &id,
                        metadata: metadata.as_ref(),
                        at,
                    },
                );
                tracing::debug!(
                    scheduler = %self.inner.config.name,
                    task_id = %id,
                    running = self.running(),
                    "task fulfilled"
                );
            }
            Err(reason) => {
                self.transition(
                    TaskState::Running,
                    &TaskSignal::Failed {
                        task_id: &id,
                        metadata: metadata.as_ref(),
                        reason,
                        at,
                    },
                );
                tracing::warn!(
                    scheduler = %self.inner.config.name,
                    task_id = %id,
                    reason = %reason,
                    "task rejected"
                );
            }
        }
        drop(metadata);

        self.pull();
    }

    /// Move a task from `from` to the state `signal` reports, keeping the
    /// slot count in step, then notify handlers
    fn transition(&self, from: TaskState, signal: &TaskSignal<'_, M>) {
        let to = signal.state();
        debug_assert!(
            from.can_transition_to(to),
            "invalid task transition {:?} -> {:?}",
            from,
            to
        );

        if to.is_active() {
            self.inner.running.set(self.running() + 1);
        } else if from.is_active() && to.is_terminal() {
            self.inner.running.set(self.running() - 1);
        }
        self.inner.signals.dispatch(signal);
    }
}
