//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete implementation of the
//! [`RuntimeScheduler`] trait defined in `fiber-core`. Applications
//! construct a [`StdRuntime`], hand its [`Runtime`] to
//! [`fiber_core::FiberRoot::with_runtime`], and call [`StdRuntime::pump`]
//! from their event loop whenever the registered waker fires.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use fiber_core::{ReconcileError, Runtime, RuntimeHandle, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records requests in atomics and pokes an optional waker.
pub struct StdScheduler {
    microtask_requested: AtomicBool,
    task_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            microtask_requested: AtomicBool::new(false),
            task_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a sync flush has been requested since the last call.
    pub fn take_microtask_request(&self) -> bool {
        self.microtask_requested.swap(false, Ordering::SeqCst)
    }

    /// Returns whether a task has been requested since the last call.
    pub fn take_task_request(&self) -> bool {
        self.task_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever the runtime asks for a turn.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "microtask_requested",
                &self.microtask_requested.load(Ordering::SeqCst),
            )
            .field("task_requested", &self.task_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_microtask(&self) {
        self.microtask_requested.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn schedule_task(&self) {
        self.task_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Convenience container bundling the standard scheduler with a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    /// Creates a new standard runtime instance.
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    /// Returns a [`fiber_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    /// Returns a handle to the runtime.
    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn take_microtask_request(&self) -> bool {
        self.scheduler.take_microtask_request()
    }

    pub fn take_task_request(&self) -> bool {
        self.scheduler.take_task_request()
    }

    /// Registers a waker to be called when the runtime needs a turn.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    /// Clears any previously registered waker.
    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Services whatever was requested since the last call: the sync queue
    /// first, then one batch of tasks. Returns whether anything ran.
    pub fn pump(&self) -> Result<bool, ReconcileError> {
        let microtask = self.take_microtask_request();
        let task = self.take_task_request();
        if microtask {
            self.runtime.flush_sync_callbacks()?;
        }
        if task {
            self.runtime.drain_tasks()?;
        }
        if microtask || task {
            log::trace!("pumped runtime (microtask: {microtask}, task: {task})");
        }
        Ok(microtask || task)
    }

    /// Runs both queues until nothing is left.
    pub fn run_until_idle(&self) -> Result<(), ReconcileError> {
        self.runtime.run_until_idle()?;
        self.take_microtask_request();
        self.take_task_request();
        Ok(())
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use fiber_core::{
        component, element, use_effect, use_state, Deps, EffectCleanup, FiberRoot, MemoryHost,
        Props, RenderResult, SetState,
    };
    use fiber_macros::function_component;

    use super::StdRuntime;

    thread_local! {
        static SETTER: RefCell<Option<SetState<i32>>> = const { RefCell::new(None) };
    }

    #[function_component]
    fn Clicks(_props: &Props) -> RenderResult {
        let (clicks, set_clicks) = use_state(|| 0)?;
        SETTER.with(|slot| *slot.borrow_mut() = Some(set_clicks));
        use_effect(Deps::Always, EffectCleanup::none)?;
        Ok(element("p").child(clicks.to_string()).build())
    }

    #[test]
    fn std_runtime_requests_turns_and_rerenders_on_state_change() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        runtime.set_waker({
            let wakes = Arc::clone(&wakes);
            move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            }
        });

        let root = FiberRoot::with_runtime(
            MemoryHost::CONTAINER,
            MemoryHost::new(),
            runtime.runtime(),
        );
        root.render(component(Clicks));
        assert!(wakes.load(Ordering::SeqCst) > 0, "render should wake the loop");
        assert!(runtime.pump().expect("first pump"));
        assert_eq!(
            root.with_host(|host| host.text_content(MemoryHost::CONTAINER)),
            "0"
        );

        // The mounted effect asked for a passive flush.
        assert!(runtime.take_task_request());
        runtime.runtime().drain_tasks().expect("passive flush");

        let setter = SETTER.with(|slot| slot.borrow().clone()).expect("setter captured");
        setter.set(3);
        assert!(runtime.take_microtask_request(), "set should request a flush");
        runtime.runtime().flush_sync_callbacks().expect("sync flush");
        assert_eq!(
            root.with_host(|host| host.text_content(MemoryHost::CONTAINER)),
            "3"
        );

        runtime.run_until_idle().expect("idle");
        assert!(!runtime.pump().expect("nothing left"));

        runtime.clear_waker();
        let before = wakes.load(Ordering::SeqCst);
        setter.set(4);
        assert_eq!(wakes.load(Ordering::SeqCst), before);
        runtime.run_until_idle().expect("idle");
    }
}
