//! Cancellation handles for scheduled callbacks

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier of a scheduled timer, unique within its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Handle returned by `set_timeout` and `set_interval`
///
/// Clones share the cancellation flag, so any clone can cancel the timer.
/// An interval keeps the same handle across re-arms.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: TimerId,
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    pub(crate) fn new(id: TimerId) -> Self {
        Self {
            id,
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// Timer identifier
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Prevent the callback from firing. No-op once fired or cancelled.
    pub fn cancel(&self) {
        if !self.cancelled.replace(true) {
            tracing::trace!(timer_id = %self.id, "timer cancelled");
        }
    }

    /// Check whether the timer was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cancellation() {
        let handle = TimerHandle::new(TimerId(7));
        let clone = handle.clone();

        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());

        // Second cancel is a no-op
        handle.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(handle.id().to_string(), "timer-7");
    }
}
