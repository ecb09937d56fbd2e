//! pledge-loop: single-threaded event loop for pledge promises
//!
//! Provides the turn model promises rely on: a FIFO microtask queue for
//! "run on a later turn" continuations, and a timer wheel on a virtual clock
//! for scheduled callbacks.
//!
//! # Architecture
//!
//! ```text
//! queue_microtask(f) ──► microtask queue ──┐
//!                                          ├──► EventLoop::run
//! set_timeout(d, f)  ──► timer wheel ──────┘    (drain microtasks, fire
//!                                                earliest timer, repeat)
//! ```
//!
//! Every thread has a current loop. The free functions below schedule on it;
//! [`EventLoop::enter`] swaps in a specific loop for a scope.
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//! use pledge_loop::EventLoop;
//!
//! let event_loop = EventLoop::current();
//! pledge_loop::set_timeout(Duration::from_millis(500), || println!("fired"));
//! let stats = event_loop.run().unwrap();
//! assert_eq!(stats.now, Duration::from_millis(500));
//! ```

use std::time::Duration;

mod config;
mod error;
mod event_loop;
mod handle;
mod timer_wheel;

pub use config::{LoopConfig, ENV_LOOP_NAME, ENV_MAX_MICROTASKS};
pub use error::LoopError;
pub use event_loop::{EventLoop, Microtask, RunStats, MIN_INTERVAL};
pub use handle::{TimerHandle, TimerId};

/// Queue a microtask on the current loop
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    EventLoop::current().queue_microtask(task)
}

/// Schedule a callback on the current loop
pub fn set_timeout(delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
    EventLoop::current().set_timeout(delay, callback)
}

/// Schedule a repeating callback on the current loop
pub fn set_interval(period: Duration, callback: impl FnMut() + 'static) -> TimerHandle {
    EventLoop::current().set_interval(period, callback)
}

/// Virtual time of the current loop
pub fn now() -> Duration {
    EventLoop::current().now()
}
