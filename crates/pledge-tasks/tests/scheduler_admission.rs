//! Admission order and concurrency of the scheduler, measured on the
//! loop's virtual clock through lifecycle signals

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pledge::{delay, delay_reject, Promise};
use pledge_tasks::{Scheduler, SchedulerConfig, TaskSignal};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Start(usize),
    Finish(usize),
}

type Timeline = Rc<RefCell<Vec<(Duration, Event)>>>;

fn instrument(scheduler: &Scheduler<usize>) -> Timeline {
    let timeline: Timeline = Rc::new(RefCell::new(Vec::new()));
    let sink = timeline.clone();
    scheduler.on_signal(move |signal: &TaskSignal<'_, usize>| {
        let index = *signal.metadata();
        let event = match signal {
            TaskSignal::Started { .. } => Event::Start(index),
            TaskSignal::Succeeded { .. } | TaskSignal::Failed { .. } => Event::Finish(index),
            TaskSignal::Queued { .. } => return,
        };
        sink.borrow_mut().push((signal.at(), event));
    });
    timeline
}

fn max_concurrency(timeline: &[(Duration, Event)]) -> usize {
    let mut running = 0usize;
    let mut peak = 0;
    for (_, event) in timeline {
        match event {
            Event::Start(_) => running += 1,
            Event::Finish(_) => running -= 1,
        }
        peak = peak.max(running);
    }
    peak
}

fn at(timeline: &[(Duration, Event)], wanted: Event) -> Duration {
    timeline
        .iter()
        .find(|(_, event)| *event == wanted)
        .map(|(when, _)| *when)
        .unwrap_or_else(|| panic!("{:?} never happened", wanted))
}

#[test]
fn limit_two_admits_third_task_only_after_a_slot_frees() {
    let _ = tracing_subscriber::fmt::try_init();
    let scheduler = Scheduler::new(2).unwrap();
    let timeline = instrument(&scheduler);
    let origin = scheduler.event_loop().now();

    let durations = [1000u64, 500, 300, 400];
    let results: Vec<Promise<u64>> = durations
        .iter()
        .enumerate()
        .map(|(index, &ms)| scheduler.add(move || delay(Duration::from_millis(ms), ms), index))
        .collect();

    scheduler.start();
    scheduler.event_loop().run().unwrap();

    let timeline = timeline.borrow();
    assert_eq!(max_concurrency(&timeline), 2);

    let starts: Vec<usize> = timeline
        .iter()
        .filter_map(|(_, event)| match event {
            Event::Start(index) => Some(*index),
            Event::Finish(_) => None,
        })
        .collect();
    assert_eq!(starts, vec![0, 1, 2, 3]);

    let first_finish = at(&timeline, Event::Finish(0)).min(at(&timeline, Event::Finish(1)));
    assert!(at(&timeline, Event::Start(2)) >= first_finish);
    assert_eq!(at(&timeline, Event::Start(2)), at(&timeline, Event::Finish(1)));
    assert_eq!(at(&timeline, Event::Start(3)), at(&timeline, Event::Finish(2)));

    let ms = |n: u64| origin + Duration::from_millis(n);
    assert_eq!(at(&timeline, Event::Finish(1)), ms(500));
    assert_eq!(at(&timeline, Event::Finish(2)), ms(800));
    assert_eq!(at(&timeline, Event::Finish(0)), ms(1000));
    assert_eq!(at(&timeline, Event::Finish(3)), ms(1200));

    let values: Vec<_> = results.iter().map(|p| p.value()).collect();
    assert_eq!(values, durations.iter().map(|&d| Some(d)).collect::<Vec<_>>());
}

#[test]
fn failures_free_their_slot_and_reach_the_caller() {
    let scheduler = Scheduler::with_config(SchedulerConfig {
        name: "flaky".to_string(),
        limit: 1,
    })
    .unwrap();
    let timeline = instrument(&scheduler);

    let failed: Promise<u64> =
        scheduler.add(|| delay_reject(Duration::from_millis(100), "timeout"), 0);
    let after = scheduler.add(|| delay(Duration::from_millis(100), 7u64), 1);
    scheduler.start();
    scheduler.event_loop().run().unwrap();

    assert_eq!(failed.reason().map(|r| r.to_string()), Some("timeout".to_string()));
    assert_eq!(after.value(), Some(7));

    let timeline = timeline.borrow();
    assert_eq!(at(&timeline, Event::Start(1)), at(&timeline, Event::Finish(0)));
    assert_eq!(max_concurrency(&timeline), 1);
}

#[test]
fn queue_is_fifo_even_when_later_tasks_are_shorter() {
    let scheduler = Scheduler::new(1).unwrap();
    let timeline = instrument(&scheduler);

    for (index, ms) in [300u64, 10, 200, 5].into_iter().enumerate() {
        scheduler.add(move || delay(Duration::from_millis(ms), ()), index);
    }
    scheduler.start();
    scheduler.event_loop().run().unwrap();

    let finishes: Vec<usize> = timeline
        .borrow()
        .iter()
        .filter_map(|(_, event)| match event {
            Event::Finish(index) => Some(*index),
            Event::Start(_) => None,
        })
        .collect();
    assert_eq!(finishes, vec![0, 1, 2, 3]);
}
