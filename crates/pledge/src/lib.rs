//! pledge: single-threaded promises with exactly-once settlement
//!
//! # Features
//!
//! - **Promise** - deferred value settled once, continuations always on a later turn
//! - **Resolution procedure** - adopt promises and foreign [`Awaitable`]s, detect cycles
//! - **Combinators** - `all`, `race`, `all_settled`, `any`
//! - **Coroutines** - drive resumable computations that suspend on promises
//! - **Timers** - promises settled by the loop's virtual clock
//!
//! Everything runs on a [`pledge_loop::EventLoop`]; nothing is `Send`.
//! A handler "throws" by returning `Err(Rejection)`.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pledge::{all, delay};
//! use pledge_loop::EventLoop;
//!
//! let total = all(vec![
//!     delay(Duration::from_millis(30), 1),
//!     delay(Duration::from_millis(10), 2),
//! ])
//! .map(|values| values.iter().sum::<i32>());
//!
//! let stats = EventLoop::current().run().unwrap();
//! assert_eq!(total.value(), Some(3));
//! assert_eq!(stats.now, Duration::from_millis(30));
//! ```

pub mod combinators;
pub mod coroutine;
mod error;
mod promise;
mod resolution;
mod state;
pub mod time;

pub use combinators::{all, all_settled, any, race, reject, resolve, Settled};
pub use coroutine::{Coroutine, Resume, Step};
pub use error::Rejection;
pub use promise::{Promise, PromiseId, Resolver};
pub use resolution::{Awaitable, OnFulfilled, OnRejected, Resolution};
pub use state::Status;
pub use time::{delay, delay_reject, sleep};
