//! Combinators building one promise out of many
//!
//! Inputs are anything convertible into a [`Resolution`]: promises, or
//! `Resolution::Value` for plain values (treated as already fulfilled).
//! Each input is normalised with [`resolve`] before subscribing, so plain
//! values settle on a later turn like everything else.
//!
//! | Combinator | Fulfills | Rejects |
//! |---|---|---|
//! | [`all`] | every input fulfilled, values in input order | first rejection |
//! | [`race`] | first settlement is a fulfillment | first settlement is a rejection |
//! | [`all_settled`] | every input settled | never |
//! | [`any`] | first fulfillment | every input rejected, with an aggregate |
//!
//! None of them cancel the inputs that lost.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Rejection;
use crate::promise::Promise;
use crate::resolution::Resolution;
use crate::state::Status;

/// Outcome of one input of [`all_settled`]
///
/// Serializes as `{"status": "fulfilled", "value": ..}` or
/// `{"status": "rejected", "reason": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T> {
    Fulfilled { value: T },
    Rejected { reason: Rejection },
}

impl<T> Settled<T> {
    pub fn status(&self) -> Status {
        match self {
            Settled::Fulfilled { .. } => Status::Fulfilled,
            Settled::Rejected { .. } => Status::Rejected,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled { value } => Some(value),
            Settled::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&Rejection> {
        match self {
            Settled::Fulfilled { .. } => None,
            Settled::Rejected { reason } => Some(reason),
        }
    }
}

/// Positional collector shared by the fan-in combinators
struct Slots<S> {
    slots: Vec<Option<S>>,
    remaining: usize,
}

impl<S> Slots<S> {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    /// Record slot `index`; once every slot is filled, hand them back in order
    fn fill(&mut self, index: usize, item: S) -> Option<Vec<S>> {
        if self.slots[index].replace(item).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        self.slots.iter_mut().map(Option::take).collect()
    }
}

fn resolve_all<T, I>(inputs: I) -> Vec<Promise<T>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    inputs.into_iter().map(|input| resolve(input)).collect()
}

/// Wrap `x` in a promise. Promises pass through unchanged.
pub fn resolve<T: Clone + 'static>(x: impl Into<Resolution<T>>) -> Promise<T> {
    match x.into() {
        Resolution::Promise(promise) => promise,
        Resolution::Value(value) => Promise::fulfilled(value),
        awaitable => {
            let (promise, resolver) = Promise::pending();
            resolver.resolve(awaitable);
            promise
        }
    }
}

/// Promise already rejected with `reason`
pub fn reject<T: Clone + 'static>(reason: impl Into<Rejection>) -> Promise<T> {
    Promise::rejected(reason)
}

/// Fulfill with every value, in input order, or reject with the first rejection
pub fn all<T, I>(inputs: I) -> Promise<Vec<T>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = resolve_all(inputs);
    let (output, resolver) = Promise::pending();
    if inputs.is_empty() {
        resolver.fulfill(Vec::new());
        return output;
    }

    let slots = Rc::new(RefCell::new(Slots::new(inputs.len())));
    for (index, input) in inputs.iter().enumerate() {
        let (slots, fulfill_resolver) = (Rc::clone(&slots), resolver.clone());
        let reject_resolver = resolver.clone();
        input.subscribe(
            move |value| {
                let filled = slots.borrow_mut().fill(index, value);
                if let Some(values) = filled {
                    fulfill_resolver.fulfill(values);
                }
            },
            move |reason| {
                reject_resolver.reject(reason);
            },
        );
    }
    output
}

/// Settle like whichever input settles first.
///
/// With no inputs the result stays pending forever.
pub fn race<T, I>(inputs: I) -> Promise<T>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = resolve_all(inputs);
    let (output, resolver) = Promise::pending();
    if inputs.is_empty() {
        tracing::debug!(promise_id = %output.id(), "race over no inputs never settles");
    }

    for input in &inputs {
        let (fulfill_resolver, reject_resolver) = (resolver.clone(), resolver.clone());
        input.subscribe(
            move |value| {
                fulfill_resolver.fulfill(value);
            },
            move |reason| {
                reject_resolver.reject(reason);
            },
        );
    }
    output
}

/// Fulfill with every input's outcome, in input order. Never rejects.
pub fn all_settled<T, I>(inputs: I) -> Promise<Vec<Settled<T>>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = resolve_all(inputs);
    let (output, resolver) = Promise::pending();
    if inputs.is_empty() {
        resolver.fulfill(Vec::new());
        return output;
    }

    let slots = Rc::new(RefCell::new(Slots::new(inputs.len())));
    for (index, input) in inputs.iter().enumerate() {
        let (fulfill_slots, fulfill_resolver) = (Rc::clone(&slots), resolver.clone());
        let (reject_slots, reject_resolver) = (Rc::clone(&slots), resolver.clone());
        input.subscribe(
            move |value| {
                let filled = fulfill_slots
                    .borrow_mut()
                    .fill(index, Settled::Fulfilled { value });
                if let Some(outcomes) = filled {
                    fulfill_resolver.fulfill(outcomes);
                }
            },
            move |reason| {
                let filled = reject_slots
                    .borrow_mut()
                    .fill(index, Settled::Rejected { reason });
                if let Some(outcomes) = filled {
                    reject_resolver.fulfill(outcomes);
                }
            },
        );
    }
    output
}

/// Fulfill with the first fulfillment, or reject with
/// [`Rejection::Aggregate`] once every input rejected.
///
/// With no inputs the result rejects with an empty aggregate.
pub fn any<T, I>(inputs: I) -> Promise<T>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T>>,
{
    let inputs = resolve_all(inputs);
    let (output, resolver) = Promise::pending();
    if inputs.is_empty() {
        resolver.reject(Rejection::Aggregate { reasons: Vec::new() });
        return output;
    }

    let slots = Rc::new(RefCell::new(Slots::new(inputs.len())));
    for (index, input) in inputs.iter().enumerate() {
        let (slots, reject_resolver) = (Rc::clone(&slots), resolver.clone());
        let fulfill_resolver = resolver.clone();
        input.subscribe(
            move |value| {
                fulfill_resolver.fulfill(value);
            },
            move |reason| {
                let filled = slots.borrow_mut().fill(index, reason);
                if let Some(reasons) = filled {
                    reject_resolver.reject(Rejection::Aggregate { reasons });
                }
            },
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{delay, delay_reject};
    use pledge_loop::EventLoop;
    use serde_json::json;
    use std::time::Duration;

    fn run() {
        EventLoop::current().run().unwrap();
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_resolve_passes_promises_through() {
        let original = Promise::fulfilled(1);
        assert!(resolve(original.clone()).ptr_eq(&original));

        let wrapped = resolve(Resolution::Value(2));
        assert_eq!(wrapped.value(), Some(2));

        let rejected: Promise<i32> = reject("r");
        assert_eq!(rejected.reason(), Some(Rejection::from("r")));
    }

    #[test]
    fn test_all_mixes_values_and_promises() {
        let result = all(vec![
            Resolution::Value(1),
            resolve(Resolution::Value(2)).into(),
            Resolution::Value(3),
        ]);
        run();
        assert_eq!(result.value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_all_keeps_input_order_not_settle_order() {
        let result = all(vec![delay(ms(300), "slow"), delay(ms(100), "fast"), delay(ms(200), "mid")]);
        run();
        assert_eq!(result.value(), Some(vec!["slow", "fast", "mid"]));
    }

    #[test]
    fn test_all_rejects_with_first_rejection() {
        let result = all(vec![Promise::fulfilled(1), reject("x"), Promise::fulfilled(2)]);
        run();
        assert_eq!(result.reason(), Some(Rejection::from("x")));

        let timed = all(vec![
            delay(ms(50), 1),
            delay_reject(ms(30), "second"),
            delay_reject(ms(10), "first"),
        ]);
        run();
        assert_eq!(timed.reason(), Some(Rejection::from("first")));
    }

    #[test]
    fn test_all_empty_fulfills_immediately() {
        let result = all(Vec::<Promise<i32>>::new());
        assert_eq!(result.value(), Some(Vec::new()));
    }

    #[test]
    fn test_race_takes_fastest_outcome() {
        let fulfilled = race(vec![delay(ms(30), "slow"), delay(ms(10), "fast")]);
        let rejected = race(vec![delay(ms(30), "slow"), delay_reject(ms(10), "failed fast")]);
        run();

        assert_eq!(fulfilled.value(), Some("fast"));
        assert_eq!(rejected.reason(), Some(Rejection::from("failed fast")));
    }

    #[test]
    fn test_race_plain_values_yield_first_element() {
        let result = race(vec![Resolution::Value(7), Resolution::Value(8)]);
        run();
        assert_eq!(result.value(), Some(7));
    }

    #[test]
    fn test_race_empty_stays_pending() {
        let result = race(Vec::<Promise<i32>>::new());
        run();
        assert_eq!(result.status(), Status::Pending);
    }

    #[test]
    fn test_all_settled_reports_every_outcome() {
        let result = all_settled(vec![Promise::fulfilled(1), reject("e")]);
        run();

        let outcomes = result.value().unwrap();
        assert_eq!(
            serde_json::to_value(&outcomes).unwrap(),
            json!([
                { "status": "fulfilled", "value": 1 },
                { "status": "rejected", "reason": "e" }
            ])
        );
        assert_eq!(outcomes[0].status(), Status::Fulfilled);
        assert_eq!(outcomes[1].reason(), Some(&Rejection::from("e")));
    }

    #[test]
    fn test_all_settled_empty() {
        let result = all_settled(Vec::<Promise<u8>>::new());
        assert_eq!(result.value(), Some(Vec::new()));
    }

    #[test]
    fn test_any_fulfills_with_first_fulfillment() {
        let result = any(vec![reject("a"), Promise::fulfilled(5)]);
        run();
        assert_eq!(result.value(), Some(5));
    }

    #[test]
    fn test_any_aggregates_all_rejections_in_input_order() {
        let result: Promise<i32> = any(vec![
            delay_reject(ms(20), "a"),
            delay_reject(ms(10), "b"),
        ]);
        run();

        let reason = result.reason().unwrap();
        assert_eq!(
            reason.aggregate_reasons(),
            Some(&[Rejection::from("a"), Rejection::from("b")][..])
        );
    }

    #[test]
    fn test_any_empty_rejects() {
        let result = any(Vec::<Promise<i32>>::new());
        assert_eq!(result.reason(), Some(Rejection::Aggregate { reasons: vec![] }));
    }

    #[test]
    fn test_losers_are_not_cancelled() {
        let slow = delay(ms(100), 2);
        let result = race(vec![delay(ms(10), 1), slow.clone()]);
        run();

        assert_eq!(result.value(), Some(1));
        assert_eq!(slow.value(), Some(2));
    }
}
