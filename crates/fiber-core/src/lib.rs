#![doc = r"Fiber reconciler for a declarative UI tree: element descriptions, a dual-buffered fiber tree, hooks, lanes and a host-agnostic commit phase."]

extern crate self as fiber_core;

pub mod collections;
pub mod hash;
pub mod platform;
pub mod runtime;

mod begin_work;
mod child_fiber;
mod commit_work;
mod complete_work;
mod element;
mod error;
mod fiber;
mod flags;
mod hooks;
mod host;
mod lanes;
mod root;
mod update_queue;
mod work_loop;

pub use commit_work::{CommitEffectKind, CommitReport, CommittedEffect};
pub use element::{
    component, element, fragment, fragment_builder, list, text, Callback, ComponentType,
    Element, ElementBuilder, ElementNode, ElementType, Key, PropChange, PropValue, Props,
    RenderFn, RenderResult,
};
pub use error::{HookError, ReconcileError};
pub use fiber::{
    create_fiber_from_element, create_fiber_from_fragment, create_fiber_from_text,
    create_work_in_progress, Fiber, FiberArena, FiberId, FiberProps, FiberUpdateQueue,
    MemoizedState, StateNode, WorkTag,
};
pub use flags::{Flags, HookFlags, NO_FLAGS};
pub use hooks::{
    use_effect, use_reducer, use_state, Deps, Dispatch, Effect, EffectCleanup, EffectRef,
    FunctionComponentUpdateQueue, Hook, SetState, StateHook,
};
pub use host::{Host, HostNodeId, HostOp, HostUpdate, MemoryHost, MemoryNode, MemoryNodeKind};
pub use lanes::{request_update_lane, Lane, Lanes, NO_LANE, NO_LANES};
pub use platform::RuntimeScheduler;
pub use root::{create_root, FiberRoot};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle, MAX_IDLE_ROUNDS};
pub use update_queue::{
    process_update_queue, Action, CarriedUpdates, PendingUpdates, ProcessedUpdates, QueuedWork,
    Update, UpdateQueue,
};
pub use work_loop::NESTED_UPDATE_LIMIT;

#[cfg(test)]
pub use runtime::TestScheduler;
