//! Task state machine

use serde::{Deserialize, Serialize};

/// Task state in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting in the queue for a free slot
    #[default]
    Queued,
    /// Factory invoked, its promise not settled yet
    Running,
    /// Produced promise fulfilled
    Fulfilled,
    /// Produced promise rejected
    Rejected,
}

impl TaskState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Rejected)
    }

    /// Check if the task holds a concurrency slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Valid state transitions
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Fulfilled)
                | (Self::Running, Self::Rejected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(TaskState::Queued.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Rejected));
        assert!(!TaskState::Queued.can_transition_to(TaskState::Fulfilled));
        assert!(!TaskState::Fulfilled.can_transition_to(TaskState::Running));
    }

    #[test]
    fn test_terminal_and_active() {
        assert!(TaskState::Fulfilled.is_terminal());
        assert!(TaskState::Rejected.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Running.is_active());
        assert_eq!(TaskState::default(), TaskState::Queued);
        assert_eq!(serde_json::to_string(&TaskState::Running).unwrap(), "\"RUNNING\"");
    }
}
