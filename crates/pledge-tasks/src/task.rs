//! Task identifiers

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Unique task identifier using UUID v7 (time-ordered)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub uuid::Uuid);

impl TaskId {
    /// Create a new task ID
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse from string
    pub fn from_string(s: &str) -> Result<Self, SchedulerError> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
