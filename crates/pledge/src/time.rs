//! Promises settled by the loop's timers

use std::time::Duration;

use crate::error::Rejection;
use crate::promise::Promise;

/// Fulfill with `()` after `duration` of loop time
pub fn sleep(duration: Duration) -> Promise<()> {
    delay(duration, ())
}

/// Fulfill with `value` after `duration` of loop time
pub fn delay<T: Clone + 'static>(duration: Duration, value: T) -> Promise<T> {
    let (promise, resolver) = Promise::pending();
    let timer_resolver = resolver.clone();
    let handle = resolver.event_loop().set_timeout(duration, move || {
        timer_resolver.fulfill(value);
    });
    tracing::trace!(promise_id = %promise.id(), timer_id = %handle.id(), ?duration, "delay armed");
    promise
}

/// Reject with `reason` after `duration` of loop time
pub fn delay_reject<T: Clone + 'static>(duration: Duration, reason: impl Into<Rejection>) -> Promise<T> {
    let reason = reason.into();
    let (promise, resolver) = Promise::pending();
    let timer_resolver = resolver.clone();
    resolver.event_loop().set_timeout(duration, move || {
        timer_resolver.reject(reason);
    });
    promise
}
