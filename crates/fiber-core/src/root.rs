//! Roots: the entry point that ties a host container to a fiber tree.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::commit_work::{CommitReport, PendingPassiveEffects};
use crate::element::Element;
use crate::error::ReconcileError;
use crate::fiber::{create_host_root_fiber, FiberArena, FiberId};
use crate::host::{Host, HostNodeId};
use crate::lanes::{request_update_lane, Lane, Lanes, NO_LANE, NO_LANES};
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};
use crate::update_queue::{Action, Update, UpdateQueue};

/// Everything a render pass or a commit touches. Borrowed mutably for the
/// length of a pass and never while user effects run.
pub(crate) struct RootState<H> {
    pub(crate) arena: FiberArena,
    pub(crate) host: H,
    pub(crate) container: HostNodeId,
    pub(crate) current: FiberId,
    pub(crate) pending_passive_effects: PendingPassiveEffects,
    pub(crate) last_commit: Option<CommitReport>,
}

pub(crate) struct RootInner<H> {
    pub(crate) this: Weak<RootInner<H>>,
    pub(crate) runtime: RuntimeHandle,
    /// Queue of root elements, shared with the host-root fibers.
    pub(crate) update_queue: Rc<RefCell<UpdateQueue<Element>>>,
    pub(crate) pending_lanes: Cell<Lanes>,
    /// Lane of the sync callback currently queued for this root.
    pub(crate) callback_lane: Cell<Lane>,
    pub(crate) passive_flush_scheduled: Cell<bool>,
    pub(crate) nested_update_count: Cell<usize>,
    pub(crate) state: RefCell<RootState<H>>,
}

/// A mounted tree rendering into one host container.
pub struct FiberRoot<H: Host + 'static> {
    runtime: Runtime,
    inner: Rc<RootInner<H>>,
}

impl<H: Host + 'static> FiberRoot<H> {
    /// Creates a root with its own runtime, driven by
    /// [`FiberRoot::render_sync`] or by draining [`FiberRoot::runtime`].
    pub fn new(container: HostNodeId, host: H) -> Self {
        Self::with_runtime(container, host, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(container: HostNodeId, host: H, runtime: Runtime) -> Self {
        let update_queue = Rc::new(RefCell::new(UpdateQueue::new()));
        let mut arena = FiberArena::new();
        let current = create_host_root_fiber(&mut arena, Rc::clone(&update_queue));
        arena.finish_pass();

        let handle = runtime.handle();
        let inner = Rc::new_cyclic(|this| RootInner {
            this: this.clone(),
            runtime: handle,
            update_queue,
            pending_lanes: Cell::new(NO_LANES),
            callback_lane: Cell::new(NO_LANE),
            passive_flush_scheduled: Cell::new(false),
            nested_update_count: Cell::new(0),
            state: RefCell::new(RootState {
                arena,
                host,
                container,
                current,
                pending_passive_effects: PendingPassiveEffects::default(),
                last_commit: None,
            }),
        });
        log::debug!("created root for container {container}");
        Self { runtime, inner }
    }

    /// Queues `element` as the new content of the container. Nothing is
    /// rendered until the runtime's sync queue is flushed.
    pub fn render(&self, element: impl Into<Element>) {
        self.render_with_lane(element, request_update_lane());
    }

    pub fn render_with_lane(&self, element: impl Into<Element>, lane: Lane) {
        self.inner
            .update_queue
            .borrow_mut()
            .enqueue(Update::new(Action::Replace(element.into()), lane));
        self.inner.schedule_update_on_fiber(lane);
    }

    /// Queues `element` and renders and commits it before returning.
    ///
    /// Passive effects stay queued as a deferred task; they run on the next
    /// [`Runtime::drain_tasks`] or before the next render of this root.
    pub fn render_sync(&self, element: impl Into<Element>) -> Result<(), ReconcileError> {
        self.render(element);
        self.runtime.flush_sync_callbacks()
    }

    /// Runs any passive effects queued by earlier commits. Returns whether
    /// there were any.
    pub fn flush_passive_effects(&self) -> Result<bool, ReconcileError> {
        self.inner.flush_passive_effects()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn container(&self) -> HostNodeId {
        self.inner.state.borrow().container
    }

    /// Gives access to the host surface. Must not be called from inside a
    /// component's render function.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.state.borrow().host)
    }

    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.state.borrow_mut().host)
    }

    /// Gives read access to the committed fiber tree and its root fiber.
    pub fn with_current<R>(&self, f: impl FnOnce(&FiberArena, FiberId) -> R) -> R {
        let state = self.inner.state.borrow();
        f(&state.arena, state.current)
    }

    /// What the most recent commit did.
    pub fn last_commit(&self) -> Option<CommitReport> {
        self.inner.state.borrow().last_commit.clone()
    }

    pub fn dump_fibers(&self) -> String {
        let state = self.inner.state.borrow();
        state.arena.dump_tree(state.current)
    }

    /// Live fibers across both buffers.
    pub fn fiber_count(&self) -> usize {
        self.inner.state.borrow().arena.len()
    }

    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes.get()
    }
}

impl<H: Host + 'static> fmt::Debug for FiberRoot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRoot")
            .field("pending_lanes", &self.inner.pending_lanes.get())
            .field("callback_lane", &self.inner.callback_lane.get())
            .finish_non_exhaustive()
    }
}

/// Creates a root rendering into `container` of `host`.
pub fn create_root<H: Host + 'static>(container: HostNodeId, host: H) -> FiberRoot<H> {
    FiberRoot::new(container, host)
}

#[cfg(test)]
#[path = "tests/root_tests.rs"]
mod tests;
