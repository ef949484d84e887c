//! Platform abstraction traits for reconciler scheduling.
//!
//! The runtime never runs queued work on its own. It asks the embedder to
//! come back and drain it, which lets the same core run under a test
//! harness, a blocking event loop, or anything that can call back into the
//! runtime on the thread that owns it.

/// Receives wake-up requests from a [`Runtime`](crate::Runtime).
///
/// Implementations must be safe to use from multiple threads; the requests
/// themselves carry no work and are only hints to call back.
pub trait RuntimeScheduler: Send + Sync {
    /// Sync work was queued. The embedder should call
    /// [`Runtime::flush_sync_callbacks`](crate::Runtime::flush_sync_callbacks)
    /// before yielding to anything else.
    fn schedule_microtask(&self);

    /// A deferred task, such as a passive effect flush, was queued. The
    /// embedder should call [`Runtime::drain_tasks`](crate::Runtime::drain_tasks)
    /// at its next convenient point.
    fn schedule_task(&self);
}
