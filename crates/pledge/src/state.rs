//! Promise settlement state machine

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;

use crate::error::Rejection;

/// Promise status in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not settled yet
    #[default]
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a rejection reason
    Rejected,
}

impl Status {
    /// Check if this is a terminal status
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Valid status transitions
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fulfilled) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Fulfilled => f.write_str("fulfilled"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

pub(crate) type FulfillReaction<T> = Box<dyn FnOnce(T)>;
pub(crate) type RejectReaction = Box<dyn FnOnce(Rejection)>;

thread_local! {
    static DROP_QUEUE: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Reaction closure that is dropped through a thread-local queue.
///
/// A pending reaction owns the resolver of the next promise in its chain,
/// and that promise owns its own reactions. Dropping them inline would
/// recurse once per link; here only the outermost drop drains the queue,
/// so tearing down a chain of any length uses constant stack.
pub(crate) struct Reaction<F: 'static>(Option<F>);

impl<F: 'static> Reaction<F> {
    pub fn new(f: F) -> Self {
        Reaction(Some(f))
    }

    pub fn into_inner(mut self) -> Option<F> {
        self.0.take()
    }
}

impl<F: 'static> Drop for Reaction<F> {
    fn drop(&mut self) {
        let Some(f) = self.0.take() else { return };
        // During thread teardown the queue may be gone; `f` then drops inline
        if DROP_QUEUE
            .try_with(move |queue| queue.borrow_mut().push(Box::new(f)))
            .is_err()
        {
            return;
        }
        if DRAINING.with(|draining| draining.replace(true)) {
            return;
        }
        loop {
            let next = DROP_QUEUE.with(|queue| queue.borrow_mut().pop());
            let Some(next) = next else { break };
            drop(next);
        }
        DRAINING.with(|draining| draining.set(false));
    }
}

/// Status plus payload; reactions only exist while pending
pub(crate) enum State<T> {
    Pending {
        on_fulfilled: Vec<FulfillReaction<T>>,
        on_rejected: Vec<RejectReaction>,
    },
    Fulfilled(T),
    Rejected(Rejection),
}

impl<T> Default for State<T> {
    fn default() -> Self {
        State::Pending {
            on_fulfilled: Vec::new(),
            on_rejected: Vec::new(),
        }
    }
}

impl<T> State<T> {
    pub fn status(&self) -> Status {
        match self {
            State::Pending { .. } => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    /// Move to `Fulfilled`, handing back the fulfillment reactions in
    /// registration order. `None` if already settled.
    pub fn fulfill(&mut self, value: T) -> Option<Vec<FulfillReaction<T>>> {
        if !self.status().can_transition_to(Status::Fulfilled) {
            return None;
        }
        match std::mem::replace(self, State::Fulfilled(value)) {
            State::Pending { on_fulfilled, .. } => Some(on_fulfilled),
            _ => None,
        }
    }

    /// Move to `Rejected`, handing back the rejection reactions in
    /// registration order. `None` if already settled.
    pub fn reject(&mut self, reason: Rejection) -> Option<Vec<RejectReaction>> {
        if !self.status().can_transition_to(Status::Rejected) {
            return None;
        }
        match std::mem::replace(self, State::Rejected(reason)) {
            State::Pending { on_rejected, .. } => Some(on_rejected),
            _ => None,
        }
    }
}
