//! pledge-tasks: bounded FIFO scheduling of promise-producing tasks
//!
//! # Features
//!
//! - **Concurrency ceiling** - at most `limit` tasks in flight
//! - **Strict FIFO admission** - tasks start in the order they were added
//! - **Per-task completion** - `add` returns a promise mirroring the task
//! - **Lifecycle signals** - queued/started/succeeded/failed with loop timestamps
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pledge::delay;
//! use pledge_tasks::Scheduler;
//!
//! let scheduler = Scheduler::new(2).unwrap();
//! let results: Vec<_> = [30u64, 10, 20]
//!     .into_iter()
//!     .map(|ms| scheduler.add(move || delay(Duration::from_millis(ms), ms), format!("job-{ms}")))
//!     .collect();
//!
//! scheduler.start();
//! let stats = scheduler.event_loop().run().unwrap();
//!
//! assert_eq!(results[2].value(), Some(20));
//! assert_eq!(stats.now, Duration::from_millis(30));
//! ```

mod config;
mod error;
mod scheduler;
pub mod signals;
mod state;
mod task;

pub use config::{SchedulerConfig, ENV_SCHEDULER_LIMIT, ENV_SCHEDULER_NAME};
pub use error::SchedulerError;
pub use scheduler::Scheduler;
pub use signals::{FnHandler, SignalHandler, TaskSignal};
pub use state::TaskState;
pub use task::TaskId;
