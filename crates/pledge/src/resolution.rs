//! Resolution procedure and the awaitable capability
//!
//! A promise can be resolved with a plain value, another [`Promise`], or any
//! foreign type implementing [`Awaitable`]. Promises and awaitables are
//! adopted: the target settles however they settle.
//!
//! Adoption starts on a later turn, so a chain of nested awaitables unwinds
//! through the event loop one link per microtask instead of growing the
//! stack. A one-shot guard makes sure a misbehaving awaitable that reports
//! both outcomes (or reports and then fails) settles the target once.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::Rejection;
use crate::promise::{Promise, PromiseId};

/// Callback an awaitable reports fulfillment through
pub type OnFulfilled<T> = Box<dyn FnOnce(Resolution<T>)>;

/// Callback an awaitable reports rejection through
pub type OnRejected = Box<dyn FnOnce(Rejection)>;

/// Anything exposing a `then`-shaped capability
///
/// Implementors call at most one of the callbacks, eventually. Fulfilling
/// with another [`Resolution::Promise`] or [`Resolution::Awaitable`] is
/// allowed; it is unwrapped in turn. Returning `Err` counts as a
/// synchronous failure and rejects the adopting promise unless a callback
/// already fired.
pub trait Awaitable<T> {
    /// Subscribe to the outcome
    fn on_settle(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected)
        -> Result<(), Rejection>;

    /// Identity of the underlying promise, if this is one.
    ///
    /// Only used to detect a promise being resolved with itself.
    fn promise_id(&self) -> Option<PromiseId> {
        None
    }
}

/// What a promise can be resolved with
pub enum Resolution<T> {
    /// Plain value, fulfills directly
    Value(T),
    /// Promise whose outcome is adopted
    Promise(Promise<T>),
    /// Foreign awaitable whose outcome is adopted
    Awaitable(Box<dyn Awaitable<T>>),
}

impl<T> Resolution<T> {
    /// Wrap a foreign awaitable
    pub fn awaitable(awaitable: impl Awaitable<T> + 'static) -> Self {
        Resolution::Awaitable(Box::new(awaitable))
    }

    /// Check if this is a plain value
    pub fn is_value(&self) -> bool {
        matches!(self, Resolution::Value(_))
    }
}

impl<T> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T> From<&Promise<T>> for Resolution<T> {
    fn from(promise: &Promise<T>) -> Self {
        Resolution::Promise(promise.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Awaitable(awaitable) => f
                .debug_tuple("Awaitable")
                .field(&awaitable.promise_id())
                .finish(),
        }
    }
}

impl<T: Clone + 'static> Awaitable<T> for Promise<T> {
    fn on_settle(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected)
        -> Result<(), Rejection>
    {
        self.subscribe(move |value| on_fulfilled(Resolution::Value(value)), on_rejected);
        Ok(())
    }

    fn promise_id(&self) -> Option<PromiseId> {
        Some(self.id())
    }
}

/// Settle `target` with `resolution`
pub(crate) fn resolve_into<T: Clone + 'static>(target: &Promise<T>, resolution: Resolution<T>) {
    let awaitable: Box<dyn Awaitable<T>> = match resolution {
        Resolution::Value(value) => {
            target.settle_fulfilled(value);
            return;
        }
        Resolution::Promise(promise) => Box::new(promise),
        Resolution::Awaitable(awaitable) => awaitable,
    };

    if awaitable.promise_id() == Some(target.id()) {
        tracing::debug!(promise_id = %target.id(), "chaining cycle detected");
        target.settle_rejected(Rejection::ChainingCycle(target.id()));
        return;
    }

    let target = target.clone();
    let event_loop = target.event_loop().clone();
    event_loop.queue_microtask(move || adopt(target, awaitable));
}

fn adopt<T: Clone + 'static>(target: Promise<T>, awaitable: Box<dyn Awaitable<T>>) {
    let called = Rc::new(Cell::new(false));

    let (fulfill_target, fulfill_called) = (target.clone(), Rc::clone(&called));
    let on_fulfilled: OnFulfilled<T> = Box::new(move |inner: Resolution<T>| {
        if !fulfill_called.replace(true) {
            resolve_into(&fulfill_target, inner);
        }
    });

    let (reject_target, reject_called) = (target.clone(), Rc::clone(&called));
    let on_rejected: OnRejected = Box::new(move |reason: Rejection| {
        if !reject_called.replace(true) {
            reject_target.settle_rejected(reason);
        }
    });

    if let Err(reason) = awaitable.on_settle(on_fulfilled, on_rejected) {
        if !called.replace(true) {
            tracing::trace!(promise_id = %target.id(), reason = %reason, "awaitable failed to subscribe");
            target.settle_rejected(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Status;
    use pledge_loop::EventLoop;
    use std::cell::RefCell;

    fn run() {
        EventLoop::current().run().unwrap();
    }

    /// Awaitable that reports a fixed sequence of outcomes synchronously
    struct Scripted {
        fulfill_with: Option<i32>,
        then_reject: bool,
        then_fail: bool,
    }

    impl Awaitable<i32> for Scripted {
        fn on_settle(self: Box<Self>, on_fulfilled: OnFulfilled<i32>, on_rejected: OnRejected)
            -> Result<(), Rejection>
        {
            if let Some(value) = self.fulfill_with {
                on_fulfilled(Resolution::Value(value));
            }
            if self.then_reject {
                on_rejected("second outcome".into());
            }
            if self.then_fail {
                return Err("thrown after reporting".into());
            }
            Ok(())
        }
    }

    /// Awaitable that fulfills with another awaitable `depth` times
    struct Nested {
        depth: u32,
    }

    impl Awaitable<u32> for Nested {
        fn on_settle(self: Box<Self>, on_fulfilled: OnFulfilled<u32>, _: OnRejected)
            -> Result<(), Rejection>
        {
            if self.depth == 0 {
                on_fulfilled(Resolution::Value(0));
            } else {
                on_fulfilled(Resolution::awaitable(Nested { depth: self.depth - 1 }));
            }
            Ok(())
        }
    }

    #[test]
    fn test_self_resolution_is_a_cycle() {
        let (promise, resolver) = Promise::<i32>::pending();
        resolver.resolve(&promise);

        assert_eq!(promise.status(), Status::Rejected);
        assert!(promise.reason().is_some_and(|r| r.is_cycle()));
    }

    #[test]
    fn test_handler_returning_its_own_promise_is_a_cycle() {
        let slot: Rc<RefCell<Option<Promise<i32>>>> = Rc::new(RefCell::new(None));
        let handler_slot = slot.clone();

        let chained = Promise::fulfilled(1).then(
            move |_| match handler_slot.borrow().clone() {
                Some(own) => Ok(Resolution::Promise(own)),
                None => Err("slot empty".into()),
            },
            Err,
        );
        *slot.borrow_mut() = Some(chained.clone());
        run();

        assert_eq!(chained.reason(), Some(Rejection::ChainingCycle(chained.id())));
    }

    #[test]
    fn test_awaitable_first_outcome_wins() {
        let (promise, resolver) = Promise::<i32>::pending();
        resolver.resolve(Resolution::awaitable(Scripted {
            fulfill_with: Some(3),
            then_reject: true,
            then_fail: true,
        }));
        run();
        assert_eq!(promise.value(), Some(3));
    }

    #[test]
    fn test_awaitable_failure_rejects() {
        let (promise, resolver) = Promise::<i32>::pending();
        resolver.resolve(Resolution::awaitable(Scripted {
            fulfill_with: None,
            then_reject: false,
            then_fail: true,
        }));
        run();
        assert_eq!(promise.reason(), Some(Rejection::from("thrown after reporting")));
    }

    #[test]
    fn test_deeply_nested_awaitables_unwind_through_loop() {
        let (promise, resolver) = Promise::<u32>::pending();
        resolver.resolve(Resolution::awaitable(Nested { depth: 50_000 }));

        let stats = EventLoop::current().run().unwrap();
        assert_eq!(promise.value(), Some(0));
        assert!(stats.microtasks > 50_000);
    }

    #[test]
    fn test_promise_as_boxed_awaitable_still_detects_cycle() {
        let (promise, resolver) = Promise::<i32>::pending();
        resolver.resolve(Resolution::awaitable(promise.clone()));
        assert!(promise.reason().is_some_and(|r| r.is_cycle()));
    }
}
