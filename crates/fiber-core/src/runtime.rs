use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::ReconcileError;
use crate::platform::RuntimeScheduler;

/// Work that must run before control returns to the embedder.
pub(crate) type SyncCallback = Box<dyn FnOnce() -> Result<(), ReconcileError> + 'static>;

/// Deferred work, such as flushing passive effects.
pub(crate) type Task = Box<dyn FnOnce() -> Result<(), ReconcileError> + 'static>;

/// Rounds [`Runtime::run_until_idle`] allows before giving up.
pub const MAX_IDLE_ROUNDS: usize = 1000;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    sync_queue: RefCell<VecDeque<SyncCallback>>,
    is_flushing_sync_queue: Cell<bool>,
    pending_tasks: RefCell<VecDeque<Task>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            sync_queue: RefCell::new(VecDeque::new()),
            is_flushing_sync_queue: Cell::new(false),
            pending_tasks: RefCell::new(VecDeque::new()),
        }
    }

    fn schedule_sync_callback(&self, callback: SyncCallback) {
        self.sync_queue.borrow_mut().push_back(callback);
        self.scheduler.schedule_microtask();
    }

    /// Runs queued sync callbacks, including those queued while flushing,
    /// until the queue is empty or one fails. A nested call is a no-op; the
    /// outer flush picks up whatever was added.
    fn flush_sync_callbacks(&self) -> Result<(), ReconcileError> {
        if self.is_flushing_sync_queue.replace(true) {
            return Ok(());
        }
        let result = loop {
            let next = self.sync_queue.borrow_mut().pop_front();
            let Some(callback) = next else {
                break Ok(());
            };
            if let Err(error) = callback() {
                break Err(error);
            }
        };
        self.is_flushing_sync_queue.set(false);
        result
    }

    fn has_sync_callbacks(&self) -> bool {
        !self.sync_queue.borrow().is_empty()
    }

    fn enqueue_task(&self, task: Task) {
        self.pending_tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_task();
    }

    /// Runs the tasks queued so far. Tasks queued while draining wait for
    /// the next drain.
    fn drain_tasks(&self) -> Result<(), ReconcileError> {
        let mut tasks: VecDeque<Task> = {
            let mut pending = self.pending_tasks.borrow_mut();
            pending.drain(..).collect()
        };
        while let Some(task) = tasks.pop_front() {
            if let Err(error) = task() {
                let mut pending = self.pending_tasks.borrow_mut();
                while let Some(task) = tasks.pop_back() {
                    pending.push_front(task);
                }
                return Err(error);
            }
        }
        Ok(())
    }

    fn has_tasks(&self) -> bool {
        !self.pending_tasks.borrow().is_empty()
    }
}

/// Single-threaded queue of reconciler work.
///
/// Roots never render from inside the call that requested an update; they
/// queue a sync callback here and the embedder drains it, which keeps every
/// render and commit out of user callbacks.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn flush_sync_callbacks(&self) -> Result<(), ReconcileError> {
        self.inner.flush_sync_callbacks()
    }

    /// Runs deferred tasks. On failure the tasks that did not run stay
    /// queued, ahead of anything queued since.
    pub fn drain_tasks(&self) -> Result<(), ReconcileError> {
        self.inner.drain_tasks()
    }

    pub fn has_pending_work(&self) -> bool {
        self.inner.has_sync_callbacks() || self.inner.has_tasks()
    }

    /// Alternates sync flushes and task drains until nothing is queued.
    pub fn run_until_idle(&self) -> Result<(), ReconcileError> {
        for _ in 0..MAX_IDLE_ROUNDS {
            self.flush_sync_callbacks()?;
            if !self.has_pending_work() {
                return Ok(());
            }
            self.drain_tasks()?;
        }
        log::error!("runtime still busy after {MAX_IDLE_ROUNDS} rounds");
        Err(ReconcileError::UpdateDepthExceeded {
            limit: MAX_IDLE_ROUNDS,
        })
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_microtask(&self) {}

    fn schedule_task(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    microtasks: std::sync::atomic::AtomicUsize,
    tasks: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn microtask_requests(&self) -> usize {
        self.microtasks.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn task_requests(&self) -> usize {
        self.tasks.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_microtask(&self) {
        self.microtasks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn schedule_task(&self) {
        self.tasks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Non-owning access to a [`Runtime`]. Every call is a no-op once the
/// runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn schedule_sync_callback(&self, callback: SyncCallback) {
        match self.0.upgrade() {
            Some(inner) => inner.schedule_sync_callback(callback),
            None => log::warn!("sync callback dropped: runtime is gone"),
        }
    }

    pub(crate) fn spawn_task(&self, task: Task) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue_task(task),
            None => log::warn!("task dropped: runtime is gone"),
        }
    }

    pub fn flush_sync_callbacks(&self) -> Result<(), ReconcileError> {
        match self.0.upgrade() {
            Some(inner) => inner.flush_sync_callbacks(),
            None => Ok(()),
        }
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_tasks())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
