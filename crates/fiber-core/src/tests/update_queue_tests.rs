use super::*;

fn replace(value: i32, lane: Lane) -> Update<i32> {
    Update::new(Action::Replace(value), lane)
}

fn add(delta: i32, lane: Lane) -> Update<i32> {
    Update::new(Action::reduce(move |state: &i32| state + delta), lane)
}

#[test]
fn new_queue_has_nothing_pending() {
    let mut queue = UpdateQueue::<i32>::new();
    assert!(!queue.has_pending());
    assert!(queue.take_pending().is_none());
}

#[test]
fn updates_are_applied_in_enqueue_order() {
    let mut queue = UpdateQueue::new();
    queue
        .enqueue(replace(10, Lanes::SYNC))
        .enqueue(add(1, Lanes::SYNC))
        .enqueue(Update::new(
            Action::reduce(|state: &i32| state * 3),
            Lanes::SYNC,
        ));

    let pending = queue.take_pending();
    assert!(!queue.has_pending());
    let processed = process_update_queue(0, pending, Lanes::SYNC);
    assert_eq!(processed.memoized_state, 33);
    assert!(processed.carried.is_none());
    assert_eq!(processed.skipped_lanes, NO_LANES);
}

#[test]
fn processing_nothing_returns_base_state() {
    let processed = process_update_queue(7, None::<PendingUpdates<i32>>, Lanes::SYNC);
    assert_eq!(processed.memoized_state, 7);
}

#[test]
fn other_lanes_are_carried_forward_in_order() {
    let mut queue = UpdateQueue::new();
    queue
        .enqueue(add(1, Lanes::SYNC))
        .enqueue(add(10, Lanes::DEFAULT))
        .enqueue(add(100, Lanes::SYNC))
        .enqueue(add(1000, Lanes::DEFAULT));

    let work = queue.take_work();
    assert!(work.base_state.is_none());
    let processed = process_update_queue(0, work.updates, Lanes::SYNC);
    assert_eq!(processed.memoized_state, 101);
    assert_eq!(processed.skipped_lanes, Lanes::DEFAULT);
    let carried = processed.carried.expect("default-lane updates carried");
    assert_eq!(carried.base_state, 1, "rebase point is the state before the first skip");
    assert_eq!(carried.updates.len(), 3, "the applied +100 is kept for the replay");

    queue.enqueue(add(5, Lanes::DEFAULT));
    queue.carry(carried);
    assert!(queue.has_pending());

    let work = queue.take_work();
    assert_eq!(work.base_state, Some(1));
    let pending = work.updates.expect("carried chain");
    assert_eq!(pending.lanes(), Lanes::DEFAULT);
    let order: Vec<i32> = pending
        .into_updates()
        .map(|update| match update.action {
            Action::Reduce(f) => f(&0),
            Action::Replace(v) => v,
        })
        .collect();
    assert_eq!(order, vec![10, 100, 1000, 5]);
    assert!(!queue.has_pending());
}

#[test]
fn replay_keeps_the_last_enqueued_value() {
    let mut queue = UpdateQueue::new();
    queue
        .enqueue(replace(5, Lanes::DEFAULT))
        .enqueue(replace(7, Lanes::SYNC));

    let work = queue.take_work();
    let sync = process_update_queue(0, work.updates, Lanes::SYNC);
    assert_eq!(sync.memoized_state, 7);
    queue.carry(sync.carried.expect("skipped replace carried"));

    let work = queue.take_work();
    let base = work.base_state.unwrap_or(sync.memoized_state);
    assert_eq!(base, 0);
    let default = process_update_queue(base, work.updates, Lanes::DEFAULT);
    assert_eq!(default.memoized_state, 7);
    assert!(default.carried.is_none());
    assert_eq!(default.skipped_lanes, NO_LANES);
}

#[test]
fn replayed_updates_apply_on_any_lane() {
    let mut queue = UpdateQueue::new();
    queue
        .enqueue(add(1, Lanes::TRANSITION))
        .enqueue(add(10, Lanes::SYNC));
    let first = process_update_queue(0, queue.take_work().updates, Lanes::SYNC);
    assert_eq!(first.memoized_state, 10);
    queue.carry(first.carried.expect("transition carried"));

    // A second sync pass still skips the transition but re-applies +10.
    let work = queue.take_work();
    let second = process_update_queue(work.base_state.unwrap_or(0), work.updates, Lanes::SYNC);
    assert_eq!(second.memoized_state, 10);
    let carried = second.carried.expect("still carried");
    assert_eq!(carried.base_state, 0);
    assert_eq!(carried.updates.len(), 2);
}

#[test]
fn enqueue_during_processing_lands_in_a_fresh_chain() {
    let mut queue = UpdateQueue::new();
    queue.enqueue(replace(1, Lanes::SYNC));
    let pending = queue.take_pending();
    queue.enqueue(replace(2, Lanes::SYNC));

    let first = process_update_queue(0, pending, Lanes::SYNC);
    assert_eq!(first.memoized_state, 1);
    let second = process_update_queue(first.memoized_state, queue.take_pending(), Lanes::SYNC);
    assert_eq!(second.memoized_state, 2);
}
