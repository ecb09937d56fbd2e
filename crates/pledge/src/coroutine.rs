//! Drive resumable computations over promises
//!
//! A [`Coroutine`] is a state holder that runs until it either finishes or
//! suspends on something awaitable. [`spawn`] drives one to completion: each
//! suspension subscribes to the emitted promise and resumes the coroutine
//! with its value, or injects its rejection through
//! [`Coroutine::resume_with_error`]. The whole run is represented by a single
//! terminal promise.
//!
//! ```rust
//! use pledge::coroutine::{self, Resume, Step};
//! use pledge::{Promise, Rejection};
//! use pledge_loop::EventLoop;
//!
//! let run = coroutine::wrap(|| {
//!     coroutine::from_fn(|resume: Resume<u32>| -> Result<Step<u32, u32>, Rejection> {
//!         match resume {
//!             Resume::Start => Ok(Step::Suspend(Promise::fulfilled(20).into())),
//!             Resume::Value(v) => Ok(Step::Done(v + 1)),
//!             Resume::Error(reason) => Err(reason),
//!         }
//!     })
//! });
//!
//! let answer = run();
//! EventLoop::current().run().unwrap();
//! assert_eq!(answer.value(), Some(21));
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::combinators;
use crate::error::Rejection;
use crate::promise::{Promise, Resolver};
use crate::resolution::Resolution;

/// What a coroutine reports after each advance
pub enum Step<V, O> {
    /// Suspended; resume once this settles
    Suspend(Resolution<V>),
    /// Finished with a final output
    Done(O),
}

/// Input of one advance, as seen by [`from_fn`] closures
#[derive(Debug, Clone, PartialEq)]
pub enum Resume<V> {
    /// First entry
    Start,
    /// The awaited promise fulfilled
    Value(V),
    /// The awaited promise rejected
    Error(Rejection),
}

/// Resumable computation that suspends on promises
pub trait Coroutine {
    /// Value produced by each suspension point
    type Value: Clone + 'static;
    /// Final output
    type Output: Clone + 'static;

    /// Advance with the value of the last suspension (`None` on first entry).
    /// `Err` fails the whole run.
    fn resume(&mut self, input: Option<Self::Value>)
        -> Result<Step<Self::Value, Self::Output>, Rejection>;

    /// Advance after the last suspension rejected. By default the reason is
    /// re-raised, failing the run.
    fn resume_with_error(&mut self, reason: Rejection)
        -> Result<Step<Self::Value, Self::Output>, Rejection>
    {
        Err(reason)
    }
}

/// Coroutine built from a closure, see [`from_fn`]
pub struct FnCoroutine<F, V, O> {
    step: F,
    _marker: PhantomData<fn(V) -> O>,
}

/// Adapt a closure over [`Resume`] into a [`Coroutine`]
pub fn from_fn<V, O, F>(step: F) -> FnCoroutine<F, V, O>
where
    F: FnMut(Resume<V>) -> Result<Step<V, O>, Rejection>,
{
    FnCoroutine {
        step,
        _marker: PhantomData,
    }
}

impl<F, V, O> Coroutine for FnCoroutine<F, V, O>
where
    F: FnMut(Resume<V>) -> Result<Step<V, O>, Rejection>,
    V: Clone + 'static,
    O: Clone + 'static,
{
    type Value = V;
    type Output = O;

    fn resume(&mut self, input: Option<V>) -> Result<Step<V, O>, Rejection> {
        match input {
            None => (self.step)(Resume::Start),
            Some(value) => (self.step)(Resume::Value(value)),
        }
    }

    fn resume_with_error(&mut self, reason: Rejection) -> Result<Step<V, O>, Rejection> {
        (self.step)(Resume::Error(reason))
    }
}

/// Start driving `coroutine`; the first advance happens synchronously.
pub fn spawn<C>(coroutine: C) -> Promise<C::Output>
where
    C: Coroutine + 'static,
{
    let (terminal, resolver) = Promise::pending();
    tracing::trace!(promise_id = %terminal.id(), "coroutine spawned");
    drive(Rc::new(RefCell::new(coroutine)), resolver, Ok(None));
    terminal
}

/// Turn a coroutine factory into a function starting one run per call
pub fn wrap<C, F>(factory: F) -> impl Fn() -> Promise<C::Output>
where
    C: Coroutine + 'static,
    F: Fn() -> C,
{
    move || spawn(factory())
}

type Input<V> = Result<Option<V>, Rejection>;

fn drive<C>(coroutine: Rc<RefCell<C>>, resolver: Resolver<C::Output>, input: Input<C::Value>)
where
    C: Coroutine + 'static,
{
    let step = {
        let mut coroutine = coroutine.borrow_mut();
        match input {
            Ok(value) => coroutine.resume(value),
            Err(reason) => coroutine.resume_with_error(reason),
        }
    };

    match step {
        Ok(Step::Done(output)) => {
            tracing::trace!(promise_id = %resolver.id(), "coroutine finished");
            resolver.fulfill(output);
        }
        Ok(Step::Suspend(emitted)) => {
            let emitted = combinators::resolve(emitted);
            let (reject_coroutine, reject_resolver) = (Rc::clone(&coroutine), resolver.clone());
            emitted.subscribe(
                move |value| drive(coroutine, resolver, Ok(Some(value))),
                move |reason| drive(reject_coroutine, reject_resolver, Err(reason)),
            );
        }
        Err(reason) => {
            tracing::trace!(promise_id = %resolver.id(), reason = %reason, "coroutine failed");
            resolver.reject(reason);
        }
    }
}
