//! Promise: a single-threaded deferred value with exactly-once settlement
//!
//! A promise starts `Pending` and settles at most once, to `Fulfilled` or
//! `Rejected`. Reactions registered with [`Promise::then`] always run on a
//! later turn of the promise's [`EventLoop`], in registration order, even
//! when the promise is already settled at registration time.
//!
//! # Example
//!
//! ```rust
//! use pledge::{Promise, Rejection, Resolution};
//! use pledge_loop::EventLoop;
//!
//! let doubled = Promise::new(|resolver| {
//!     resolver.fulfill(21);
//!     Ok(())
//! })
//! .then(
//!     |v| Ok(Resolution::Value(v * 2)),
//!     |reason: Rejection| Err(reason),
//! );
//!
//! EventLoop::current().run().unwrap();
//! assert_eq!(doubled.value(), Some(42));
//! ```

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use pledge_loop::EventLoop;

use crate::error::Rejection;
use crate::resolution::{resolve_into, Resolution};
use crate::state::{Reaction, State, Status};

thread_local! {
    static NEXT_PROMISE_ID: Cell<u64> = const { Cell::new(0) };
}

/// Identifier of a promise, unique per thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PromiseId(pub u64);

impl PromiseId {
    fn next() -> Self {
        NEXT_PROMISE_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            PromiseId(id)
        })
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise-{}", self.0)
    }
}

/// Handle to a deferred outcome. Clones refer to the same promise.
pub struct Promise<T> {
    inner: Rc<Inner<T>>,
}

struct Inner<T> {
    id: PromiseId,
    event_loop: EventLoop,
    state: RefCell<State<T>>,
    /// Set once a resolver hands the promise's fate to an awaitable
    adopting: Cell<bool>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("status", &self.inner.state.borrow().status())
            .finish()
    }
}

impl<T> Promise<T> {
    /// Promise identifier
    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.inner.state.borrow().status()
    }

    /// Check if the promise has settled
    pub fn is_settled(&self) -> bool {
        self.status().is_settled()
    }

    /// Loop this promise schedules its reactions on
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// Check whether two handles refer to the same promise
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Rejection reason, if rejected
    pub fn reason(&self) -> Option<Rejection> {
        match &*self.inner.state.borrow() {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// Create a promise and run `executor` synchronously with its resolver.
    ///
    /// An `Err` returned by the executor rejects the promise, unless the
    /// executor already settled it.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> Result<(), Rejection>,
    {
        let (promise, resolver) = Self::pending();
        if let Err(reason) = executor(resolver.clone()) {
            tracing::trace!(promise_id = %promise.id(), reason = %reason, "executor failed");
            resolver.reject(reason);
        }
        promise
    }

    /// Create a pending promise on the current loop, with the resolver
    /// that settles it
    pub fn pending() -> (Self, Resolver<T>) {
        Self::pending_in(&EventLoop::current())
    }

    /// Create a pending promise on a specific loop
    pub fn pending_in(event_loop: &EventLoop) -> (Self, Resolver<T>) {
        let promise = Self {
            inner: Rc::new(Inner {
                id: PromiseId::next(),
                event_loop: event_loop.clone(),
                state: RefCell::new(State::default()),
                adopting: Cell::new(false),
            }),
        };
        let resolver = Resolver {
            promise: promise.clone(),
        };
        (promise, resolver)
    }

    /// Promise already fulfilled with `value`
    pub fn fulfilled(value: T) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.fulfill(value);
        promise
    }

    /// Promise already rejected with `reason`
    pub fn rejected(reason: impl Into<Rejection>) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.reject(reason);
        promise
    }

    /// Fulfillment value, if fulfilled
    pub fn value(&self) -> Option<T> {
        match &*self.inner.state.borrow() {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Settle as fulfilled. Returns false if already settled.
    pub(crate) fn settle_fulfilled(&self, value: T) -> bool {
        let reactions = self.inner.state.borrow_mut().fulfill(value.clone());
        let Some(reactions) = reactions else {
            tracing::trace!(promise_id = %self.id(), "ignoring fulfillment of settled promise");
            return false;
        };

        tracing::trace!(promise_id = %self.id(), reactions = reactions.len(), "promise fulfilled");
        for reaction in reactions {
            let value = value.clone();
            self.inner.event_loop.queue_microtask(move || reaction(value));
        }
        true
    }

    /// Settle as rejected. Returns false if already settled.
    pub(crate) fn settle_rejected(&self, reason: Rejection) -> bool {
        let reactions = self.inner.state.borrow_mut().reject(reason.clone());
        let Some(reactions) = reactions else {
            tracing::trace!(promise_id = %self.id(), "ignoring rejection of settled promise");
            return false;
        };

        tracing::trace!(
            promise_id = %self.id(),
            reactions = reactions.len(),
            reason = %reason,
            "promise rejected"
        );
        for reaction in reactions {
            let reason = reason.clone();
            self.inner.event_loop.queue_microtask(move || reaction(reason));
        }
        true
    }

    /// Register raw reactions. Whichever side matches the outcome runs on a
    /// later turn; the other is dropped.
    pub(crate) fn subscribe<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(T) + 'static,
        R: FnOnce(Rejection) + 'static,
    {
        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            State::Pending {
                on_fulfilled: fulfill_reactions,
                on_rejected: reject_reactions,
            } => {
                let on_fulfilled = Reaction::new(on_fulfilled);
                let on_rejected = Reaction::new(on_rejected);
                fulfill_reactions.push(Box::new(move |value| {
                    if let Some(f) = on_fulfilled.into_inner() {
                        f(value);
                    }
                }));
                reject_reactions.push(Box::new(move |reason| {
                    if let Some(r) = on_rejected.into_inner() {
                        r(reason);
                    }
                }));
            }
            State::Fulfilled(value) => {
                let value = value.clone();
                self.inner.event_loop.queue_microtask(move || on_fulfilled(value));
            }
            State::Rejected(reason) => {
                let reason = reason.clone();
                self.inner.event_loop.queue_microtask(move || on_rejected(reason));
            }
        }
    }

    /// Chain a continuation.
    ///
    /// Exactly one handler runs, on a later turn, once this promise settles.
    /// Its result is fed through the resolution procedure into the returned
    /// promise: `Ok(resolution)` fulfills it (adopting the state of a promise
    /// or awaitable), `Err(reason)` rejects it.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U>, Rejection> + 'static,
        R: FnOnce(Rejection) -> Result<Resolution<U>, Rejection> + 'static,
    {
        let (downstream, resolver) = Promise::pending_in(&self.inner.event_loop);
        let reject_resolver = resolver.clone();

        self.subscribe(
            move |value| resolver.settle_with(on_fulfilled(value)),
            move |reason| reject_resolver.settle_with(on_rejected(reason)),
        );
        downstream
    }

    /// Transform the value; rejections pass through
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ok(Resolution::Value(f(value))), Err)
    }

    /// Transform the value with a fallible function; rejections pass through
    pub fn try_map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, Rejection> + 'static,
    {
        self.then(move |value| f(value).map(Resolution::Value), Err)
    }

    /// Continue with another promise; rejections pass through
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        self.then(move |value| Ok(Resolution::Promise(f(value))), Err)
    }

    /// Recover from a rejection; values pass through
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T>
    where
        R: FnOnce(Rejection) -> Result<Resolution<T>, Rejection> + 'static,
    {
        self.then(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Run `on_finally` on settlement of either kind, then forward the
    /// original outcome. An `Err` from `on_finally` replaces the outcome.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T>
    where
        F: FnOnce() -> Result<(), Rejection> + 'static,
    {
        let slot = Rc::new(RefCell::new(Some(on_finally)));
        let reject_slot = Rc::clone(&slot);

        self.then(
            move |value| {
                run_finally(&slot)?;
                Ok(Resolution::Value(value))
            },
            move |reason| {
                run_finally(&reject_slot)?;
                Err(reason)
            },
        )
    }
}

fn run_finally<F>(slot: &RefCell<Option<F>>) -> Result<(), Rejection>
where
    F: FnOnce() -> Result<(), Rejection>,
{
    let on_finally = slot.borrow_mut().take();
    match on_finally {
        Some(on_finally) => on_finally(),
        None => Ok(()),
    }
}

/// Settlement capability of a promise (`settleFulfilled` / `settleRejected`)
///
/// Clones share the promise. Once `resolve` hands the promise to another
/// promise or awaitable, further calls through any resolver are ignored.
pub struct Resolver<T> {
    promise: Promise<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise)
            .field("adopting", &self.promise.inner.adopting.get())
            .finish()
    }
}

impl<T: Clone + 'static> Resolver<T> {
    /// Identifier of the promise this resolver settles
    pub fn id(&self) -> PromiseId {
        self.promise.id()
    }

    /// Loop of the promise this resolver settles
    pub fn event_loop(&self) -> &EventLoop {
        self.promise.event_loop()
    }

    /// Whether the promise settled or is adopting another outcome
    pub fn is_settled(&self) -> bool {
        self.promise.is_settled() || self.promise.inner.adopting.get()
    }

    /// Fulfill with a plain value. Returns false if this had no effect.
    pub fn fulfill(&self, value: T) -> bool {
        if self.promise.inner.adopting.get() {
            return false;
        }
        self.promise.settle_fulfilled(value)
    }

    /// Reject with `reason`. Returns false if this had no effect.
    pub fn reject(&self, reason: impl Into<Rejection>) -> bool {
        if self.promise.inner.adopting.get() {
            return false;
        }
        self.promise.settle_rejected(reason.into())
    }

    /// Run the resolution procedure: plain values fulfill, promises and
    /// awaitables are adopted, and the promise itself is a chaining cycle.
    pub fn resolve(&self, resolution: impl Into<Resolution<T>>) {
        if self.is_settled() {
            return;
        }
        let resolution = resolution.into();
        if !resolution.is_value() {
            self.promise.inner.adopting.set(true);
        }
        resolve_into(&self.promise, resolution);
    }

    pub(crate) fn settle_with(&self, outcome: Result<Resolution<T>, Rejection>) {
        match outcome {
            Ok(resolution) => self.resolve(resolution),
            Err(reason) => {
                self.reject(reason);
            }
        }
    }
}
