//! Error types for pledge-loop

use thiserror::Error;

/// Errors that can occur while driving the event loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    /// `run` was called from a callback of the same loop
    #[error("Event loop is already running")]
    Reentrant,

    /// A single microtask drain did not reach an empty queue
    #[error("Microtask budget exceeded: more than {budget} microtasks in one drain")]
    MicrotaskBudgetExceeded { budget: usize },

    /// Invalid loop configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}
