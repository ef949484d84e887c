//! Pending state transitions for one stateful slot.
//!
//! Updates form a circular singly-linked list laid out in an index arena:
//! `tail` is the most recently enqueued update and `tail.next` the oldest,
//! so appending never walks the list.
//!
//! A pass that skips an update leaves a rebase point behind: the state
//! before the first skipped update plus every update from there on,
//! applied or not. The next pass replays that chain from the rebase point,
//! so the final state always reflects enqueue order.

use std::fmt;
use std::rc::Rc;

use crate::lanes::{Lane, Lanes, NO_LANE, NO_LANES};

/// A state transition. Reducers may run more than once when a pass is
/// replayed from a rebase point, so they must be pure.
pub enum Action<S> {
    Replace(S),
    Reduce(Rc<dyn Fn(&S) -> S>),
}

impl<S> Action<S> {
    pub fn reduce(f: impl Fn(&S) -> S + 'static) -> Self {
        Action::Reduce(Rc::new(f))
    }

    fn apply(self, state: &S) -> S {
        match self {
            Action::Replace(value) => value,
            Action::Reduce(reducer) => reducer(state),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Replace(value) => Action::Replace(value.clone()),
            Action::Reduce(reducer) => Action::Reduce(Rc::clone(reducer)),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Action::Reduce(_) => f.write_str("Reduce(..)"),
        }
    }
}

#[derive(Clone)]
pub struct Update<S> {
    pub action: Action<S>,
    /// `NO_LANE` marks an update already applied by an earlier pass; it is
    /// applied again on every replay.
    pub lane: Lane,
}

impl<S> Update<S> {
    pub fn new(action: Action<S>, lane: Lane) -> Self {
        Self { action, lane }
    }

    fn applies_to(&self, render_lane: Lane) -> bool {
        self.lane.is_empty() || render_lane.includes(self.lane)
    }
}

struct Link<S> {
    update: Update<S>,
    next: usize,
}

/// A detached circular chain of updates.
pub struct PendingUpdates<S> {
    links: Vec<Link<S>>,
    tail: usize,
}

impl<S> PendingUpdates<S> {
    fn single(update: Update<S>) -> Self {
        Self {
            links: vec![Link { update, next: 0 }],
            tail: 0,
        }
    }

    fn push_or_start(chain: &mut Option<Self>, update: Update<S>) {
        match chain.as_mut() {
            Some(chain) => chain.push(update),
            None => *chain = Some(Self::single(update)),
        }
    }

    fn push(&mut self, update: Update<S>) {
        let index = self.links.len();
        let head = self.links[self.tail].next;
        self.links.push(Link { update, next: head });
        self.links[self.tail].next = index;
        self.tail = index;
    }

    /// Splices `other` after the current tail, keeping the result circular.
    fn append(&mut self, other: PendingUpdates<S>) {
        let offset = self.links.len();
        let other_tail = other.tail + offset;
        let head = self.links[self.tail].next;
        let other_head = other.links[other.tail].next + offset;
        self.links.extend(other.links.into_iter().map(|link| Link {
            update: link.update,
            next: link.next + offset,
        }));
        self.links[self.tail].next = other_head;
        self.links[other_tail].next = head;
        self.tail = other_tail;
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn lanes(&self) -> Lanes {
        self.links
            .iter()
            .fold(NO_LANES, |lanes, link| lanes.merge(link.update.lane))
    }

    /// Consumes the chain, yielding updates oldest first.
    pub fn into_updates(self) -> impl Iterator<Item = Update<S>> {
        let mut order = Vec::with_capacity(self.links.len());
        let mut cursor = self.links[self.tail].next;
        loop {
            order.push(cursor);
            if cursor == self.tail {
                break;
            }
            cursor = self.links[cursor].next;
        }
        let mut slots: Vec<Option<Update<S>>> =
            self.links.into_iter().map(|link| Some(link.update)).collect();
        order
            .into_iter()
            .filter_map(move |index| slots[index].take())
    }
}

/// Rebase point left by a pass that skipped updates.
pub struct CarriedUpdates<S> {
    /// State before the first skipped update.
    pub base_state: S,
    /// The first skipped update and everything enqueued after it.
    pub updates: PendingUpdates<S>,
}

/// What the next pass over a queue has to process.
pub struct QueuedWork<S> {
    /// Where to start from instead of the memoized state, if a previous
    /// pass skipped something.
    pub base_state: Option<S>,
    /// Carried updates followed by newly enqueued ones.
    pub updates: Option<PendingUpdates<S>>,
}

pub struct UpdateQueue<S> {
    carried: Option<CarriedUpdates<S>>,
    pending: Option<PendingUpdates<S>>,
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self {
            carried: None,
            pending: None,
        }
    }
}

impl<S> UpdateQueue<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, update: Update<S>) -> &mut Self {
        match self.pending.as_mut() {
            Some(pending) => pending.push(update),
            None => self.pending = Some(PendingUpdates::single(update)),
        }
        self
    }

    /// Whether anything, new or carried, is waiting for a pass.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some() || self.carried.is_some()
    }

    /// Detaches the newly enqueued chain; updates enqueued afterwards start
    /// a new one. Carried updates stay where they are.
    pub fn take_pending(&mut self) -> Option<PendingUpdates<S>> {
        self.pending.take()
    }

    /// Detaches everything the next pass must process: the rebase point, if
    /// any, with the carried chain followed by the newly enqueued one.
    pub fn take_work(&mut self) -> QueuedWork<S> {
        let newer = self.pending.take();
        match self.carried.take() {
            Some(CarriedUpdates {
                base_state,
                mut updates,
            }) => {
                if let Some(newer) = newer {
                    updates.append(newer);
                }
                QueuedWork {
                    base_state: Some(base_state),
                    updates: Some(updates),
                }
            }
            None => QueuedWork {
                base_state: None,
                updates: newer,
            },
        }
    }

    /// Stores the rebase point of a pass. Anything enqueued since
    /// [`UpdateQueue::take_work`] stays behind the carried chain.
    pub fn carry(&mut self, carried: CarriedUpdates<S>) {
        self.carried = Some(carried);
    }
}

pub struct ProcessedUpdates<S> {
    pub memoized_state: S,
    /// Rebase point for the next pass; `None` when nothing was skipped.
    pub carried: Option<CarriedUpdates<S>>,
    /// Lanes of the updates this pass skipped.
    pub skipped_lanes: Lanes,
}

/// Applies, in order, every update of `pending` that belongs to
/// `render_lane`, starting from `base_state`.
///
/// From the first skipped update on, every update is also copied into the
/// carried chain; the ones applied here lose their lane so that the replay
/// applies them again after the skipped ones.
pub fn process_update_queue<S: Clone>(
    base_state: S,
    pending: Option<PendingUpdates<S>>,
    render_lane: Lane,
) -> ProcessedUpdates<S> {
    let mut state = base_state;
    let mut rebase_state: Option<S> = None;
    let mut carried: Option<PendingUpdates<S>> = None;
    let mut skipped_lanes = NO_LANES;
    if let Some(pending) = pending {
        for update in pending.into_updates() {
            if !update.applies_to(render_lane) {
                log::debug!(
                    "carrying update on lane {:?} past render lane {:?}",
                    update.lane,
                    render_lane
                );
                if rebase_state.is_none() {
                    rebase_state = Some(state.clone());
                }
                skipped_lanes = skipped_lanes.merge(update.lane);
                PendingUpdates::push_or_start(&mut carried, update);
                continue;
            }
            if carried.is_some() {
                PendingUpdates::push_or_start(
                    &mut carried,
                    Update::new(update.action.clone(), NO_LANE),
                );
            }
            state = update.action.apply(&state);
        }
    }
    let carried = match (rebase_state, carried) {
        (Some(base_state), Some(updates)) => Some(CarriedUpdates {
            base_state,
            updates,
        }),
        _ => None,
    };
    ProcessedUpdates {
        memoized_state: state,
        carried,
        skipped_lanes,
    }
}

#[cfg(test)]
#[path = "tests/update_queue_tests.rs"]
mod tests;
