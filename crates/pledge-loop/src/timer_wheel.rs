//! Timer wheel for virtual-clock timer management
//!
//! All scheduled callbacks of a loop live in one sorted collection keyed by
//! their deadline on the loop's virtual clock:
//!
//! ```text
//! set_timeout(delay, callback) → register at now + delay
//!                              ↓
//!      EventLoop::run → pop earliest live timer → advance clock → fire
//! ```
//!
//! Cancellation is tracked by the shared flag in [`TimerHandle`]; cancelled
//! entries are skipped and discarded when they reach the front.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::handle::TimerHandle;

/// Callback stored in the wheel
pub(crate) type TimerCallback = Box<dyn FnOnce()>;

/// Entry in the timer wheel representing a scheduled timer
pub(crate) struct TimerEntry {
    /// Handle for cancellation tracking
    pub handle: TimerHandle,
    /// Callback to execute when the timer fires
    pub callback: TimerCallback,
}

/// Deadline-ordered timer storage
///
/// Timers sharing a deadline fire in registration order.
#[derive(Default)]
pub(crate) struct TimerWheel {
    timers: BTreeMap<Duration, VecDeque<TimerEntry>>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer firing at `when`
    pub fn register(&mut self, when: Duration, entry: TimerEntry) {
        self.timers.entry(when).or_default().push_back(entry);
    }

    /// Deadline of the earliest live timer
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_cancelled_front();
        self.timers.keys().next().copied()
    }

    /// Remove and return the earliest live timer due at or before `upto`
    pub fn pop_due(&mut self, upto: Option<Duration>) -> Option<(Duration, TimerEntry)> {
        self.discard_cancelled_front();

        let mut slot = self.timers.first_entry()?;
        let when = *slot.key();
        if upto.is_some_and(|limit| when > limit) {
            return None;
        }

        let entry = slot.get_mut().pop_front();
        if slot.get().is_empty() {
            slot.remove();
        }
        entry.map(|entry| (when, entry))
    }

    fn discard_cancelled_front(&mut self) {
        while let Some(mut slot) = self.timers.first_entry() {
            let bucket = slot.get_mut();
            while bucket.front().is_some_and(|e| e.handle.is_cancelled()) {
                if let Some(entry) = bucket.pop_front() {
                    tracing::trace!(timer_id = %entry.handle.id(), "discarding cancelled timer");
                }
            }
            if bucket.is_empty() {
                slot.remove();
            } else {
                break;
            }
        }
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.timers
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|e| !e.handle.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::TimerId;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entry(id: u64, log: &Rc<RefCell<Vec<u64>>>) -> TimerEntry {
        let log = log.clone();
        TimerEntry {
            handle: TimerHandle::new(TimerId(id)),
            callback: Box::new(move || log.borrow_mut().push(id)),
        }
    }

    #[test]
    fn test_timer_wheel_creation() {
        let mut wheel = TimerWheel::new();
        assert!(wheel.is_empty(), "New timer wheel should be empty");
        assert_eq!(wheel.next_deadline(), None);
    }

    #[test]
    fn test_pops_in_deadline_then_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut wheel = TimerWheel::new();

        wheel.register(Duration::from_millis(20), entry(1, &log));
        wheel.register(Duration::from_millis(10), entry(2, &log));
        wheel.register(Duration::from_millis(10), entry(3, &log));
        assert_eq!(wheel.len(), 3);
        assert_eq!(wheel.next_deadline(), Some(Duration::from_millis(10)));

        while let Some((_, entry)) = wheel.pop_due(None) {
            (entry.callback)();
        }
        assert_eq!(*log.borrow(), vec![2, 3, 1]);
    }

    #[test]
    fn test_pop_due_respects_limit() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut wheel = TimerWheel::new();
        wheel.register(Duration::from_millis(50), entry(1, &log));

        assert!(wheel.pop_due(Some(Duration::from_millis(49))).is_none());
        let (when, _) = wheel.pop_due(Some(Duration::from_millis(50))).unwrap();
        assert_eq!(when, Duration::from_millis(50));
    }

    #[test]
    fn test_timer_cancellation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut wheel = TimerWheel::new();

        let cancelled = entry(1, &log);
        let handle = cancelled.handle.clone();
        wheel.register(Duration::from_millis(5), cancelled);
        wheel.register(Duration::from_millis(8), entry(2, &log));

        handle.cancel();
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.next_deadline(), Some(Duration::from_millis(8)));

        let (_, live) = wheel.pop_due(None).unwrap();
        assert_eq!(live.handle.id(), TimerId(2));
        assert!(wheel.pop_due(None).is_none());
    }
}
