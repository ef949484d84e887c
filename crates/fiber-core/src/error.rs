use thiserror::Error;

use crate::fiber::FiberId;

/// Structural misuse of the hook primitives.
///
/// Any of these aborts the render pass that produced it; nothing is
/// committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hooks can only be called while a function component is rendering")]
    OutsideRender,
    #[error("rendered more hooks than during the previous render")]
    MoreHooksThanPreviousRender,
    #[error("rendered fewer hooks than expected: previous render had {expected}, this one {rendered}")]
    FewerHooksThanPreviousRender { expected: usize, rendered: usize },
    #[error("hook {index} changed kind between renders: expected {expected}, found {found}")]
    HookKindMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("hook {index} changed its state type between renders")]
    StateTypeMismatch { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("component `{name}` failed to render: {source}")]
    Component {
        name: &'static str,
        #[source]
        source: HookError,
    },
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("fiber {id} missing from the arena")]
    FiberMissing { id: FiberId },
    #[error("root was dropped before its scheduled work ran")]
    RootDropped,
    #[error("scheduled work did not settle after {limit} rounds; an update is probably re-triggering itself")]
    UpdateDepthExceeded { limit: usize },
}
