//! Scheduler error types

use thiserror::Error;

/// Scheduler error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid task ID: {0}")]
    InvalidTaskId(String),
}

impl From<uuid::Error> for SchedulerError {
    fn from(err: uuid::Error) -> Self {
        SchedulerError::InvalidTaskId(err.to_string())
    }
}
