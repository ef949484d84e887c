//! Component-local state and effects.
//!
//! While a function component renders, a [`HookFrame`] describing it sits on
//! a thread-local stack. Hook calls read the hook list of the previous
//! render from that frame and append the new list, one record per call, in
//! call order. Effects are collected on the side so commit can queue them.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::element::{ComponentType, Element, Props};
use crate::error::{HookError, ReconcileError};
use crate::flags::HookFlags;
use crate::hash::hash_one;
use crate::lanes::{request_update_lane, Lane};
use crate::update_queue::{process_update_queue, Action, Update, UpdateQueue};

/// Something state updates can be scheduled on; implemented by roots.
pub(crate) trait UpdateTarget {
    fn schedule_update(&self, lane: Lane);
}

pub type EffectRef = Rc<RefCell<Effect>>;

type EffectCreate = Box<dyn FnOnce() -> EffectCleanup>;

/// Dependency list of an effect, reduced to a hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deps {
    /// Re-run after every render.
    Always,
    Keys(u64),
}

impl Deps {
    pub fn keys<K: Hash + ?Sized>(keys: &K) -> Self {
        Deps::Keys(hash_one(keys))
    }

    /// Run after the first render only.
    pub fn once() -> Self {
        Deps::keys(&())
    }

    fn changed_from(self, previous: Deps) -> bool {
        match (self, previous) {
            (Deps::Keys(next), Deps::Keys(prev)) => next != prev,
            _ => true,
        }
    }
}

/// Value returned by an effect body: what to run before the effect fires
/// again or its component unmounts.
#[derive(Default)]
pub struct EffectCleanup {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl EffectCleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        self.cleanup
    }
}

/// Destroy slot shared by every render's record of one effect hook.
#[derive(Default)]
pub(crate) struct EffectInstance {
    destroy: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl EffectInstance {
    pub(crate) fn take_destroy(&self) -> Option<Box<dyn FnOnce()>> {
        self.destroy.borrow_mut().take()
    }

    fn set_destroy(&self, destroy: Option<Box<dyn FnOnce()>>) {
        *self.destroy.borrow_mut() = destroy;
    }
}

/// One `use_effect` call of one render.
pub struct Effect {
    pub(crate) tag: HookFlags,
    create: Option<EffectCreate>,
    deps: Deps,
    pub(crate) instance: Rc<EffectInstance>,
}

impl Effect {
    pub(crate) fn has_tag(&self, tag: HookFlags) -> bool {
        self.tag.contains(tag)
    }

    /// Runs the effect body and stores what it returns as the new destroy.
    pub(crate) fn run_create(effect: &EffectRef) {
        let create = effect.borrow_mut().create.take();
        if let Some(create) = create {
            let destroy = create().into_cleanup();
            effect.borrow().instance.set_destroy(destroy);
        }
    }

    pub(crate) fn run_destroy(effect: &EffectRef) {
        let destroy = effect.borrow().instance.take_destroy();
        if let Some(destroy) = destroy {
            destroy();
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tag", &self.tag)
            .field("deps", &self.deps)
            .field("pending_create", &self.create.is_some())
            .finish()
    }
}

/// Effects declared by the latest render of one component, in call order.
#[derive(Clone, Default)]
pub struct FunctionComponentUpdateQueue {
    effects: Vec<EffectRef>,
}

impl FunctionComponentUpdateQueue {
    pub(crate) fn effects(&self) -> &[EffectRef] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[derive(Clone)]
pub struct StateHook {
    memoized: Rc<dyn Any>,
    queue: Rc<dyn Any>,
    disposed: Rc<Cell<bool>>,
}

#[derive(Clone)]
pub enum Hook {
    State(StateHook),
    Effect(EffectRef),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Hook::State(_) => "state",
            Hook::Effect(_) => "effect",
        }
    }
}

/// Marks the state queues of an unmounted component so later setter calls
/// are dropped instead of scheduling work.
pub(crate) fn dispose_hooks(hooks: &[Hook]) {
    for hook in hooks {
        if let Hook::State(state) = hook {
            state.disposed.set(true);
        }
    }
}

struct StateQueue<T> {
    updates: RefCell<UpdateQueue<T>>,
    disposed: Rc<Cell<bool>>,
    target: Weak<dyn UpdateTarget>,
}

/// Setter returned by [`use_state`]. Calls are queued and applied, in call
/// order, the next time the owning component renders.
pub struct SetState<T> {
    queue: Rc<StateQueue<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<T: 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.set_with_lane(value, request_update_lane());
    }

    pub fn set_with_lane(&self, value: T, lane: Lane) {
        self.dispatch(Action::Replace(value), lane);
    }

    /// Queues `f` to run against the latest state. `f` may run again if a
    /// lower-priority update forces a replay.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.update_with_lane(f, request_update_lane());
    }

    pub fn update_with_lane(&self, f: impl Fn(&T) -> T + 'static, lane: Lane) {
        self.dispatch(Action::reduce(f), lane);
    }

    /// Whether the owning component has been unmounted.
    pub fn is_disposed(&self) -> bool {
        self.queue.disposed.get()
    }

    fn dispatch(&self, action: Action<T>, lane: Lane) {
        if self.queue.disposed.get() {
            log::warn!("state update on an unmounted component was dropped");
            return;
        }
        self.queue
            .updates
            .borrow_mut()
            .enqueue(Update::new(action, lane));
        match self.queue.target.upgrade() {
            Some(target) => target.schedule_update(lane),
            None => log::warn!("state update queued after its root was dropped"),
        }
    }
}

/// Action sender returned by [`use_reducer`].
pub struct Dispatch<A> {
    inner: Rc<dyn Fn(A, Lane)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.inner)(action, request_update_lane());
    }

    pub fn dispatch_with_lane(&self, action: A, lane: Lane) {
        (self.inner)(action, lane);
    }
}

struct HookFrame {
    lane: Lane,
    target: Weak<dyn UpdateTarget>,
    /// Hooks of the committed render; `None` while mounting.
    previous: Option<Vec<Hook>>,
    hooks: Vec<Hook>,
    effects: FunctionComponentUpdateQueue,
    has_passive_effect: bool,
    error: Option<HookError>,
}

impl HookFrame {
    fn previous_hook(&self) -> Result<Option<&Hook>, HookError> {
        match &self.previous {
            None => Ok(None),
            Some(previous) => previous
                .get(self.hooks.len())
                .map(Some)
                .ok_or(HookError::MoreHooksThanPreviousRender),
        }
    }
}

thread_local! {
    static RENDER_FRAMES: RefCell<Vec<HookFrame>> = const { RefCell::new(Vec::new()) };
}

fn with_frame<R>(f: impl FnOnce(&mut HookFrame) -> Result<R, HookError>) -> Result<R, HookError> {
    RENDER_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let frame = frames.last_mut().ok_or(HookError::OutsideRender)?;
        let result = f(frame);
        if let Err(error) = &result {
            frame.error.get_or_insert_with(|| error.clone());
        }
        result
    })
}

/// Pops the frame it pushed, even if the render function panics.
struct FrameGuard {
    active: bool,
}

impl FrameGuard {
    fn install(frame: HookFrame) -> Self {
        RENDER_FRAMES.with(|frames| frames.borrow_mut().push(frame));
        Self { active: true }
    }

    fn finish(mut self) -> Option<HookFrame> {
        self.active = false;
        RENDER_FRAMES.with(|frames| frames.borrow_mut().pop())
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.active {
            RENDER_FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

pub(crate) struct RenderedComponent {
    pub(crate) children: Element,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: FunctionComponentUpdateQueue,
    pub(crate) has_passive_effect: bool,
}

/// Runs a component's render function with a fresh hook frame.
///
/// `previous` is the hook list of the committed render, or `None` when the
/// component is mounting.
pub(crate) fn render_with_hooks(
    component: ComponentType,
    props: &Props,
    previous: Option<Vec<Hook>>,
    lane: Lane,
    target: Weak<dyn UpdateTarget>,
) -> Result<RenderedComponent, ReconcileError> {
    let expected = previous.as_ref().map(Vec::len);
    let guard = FrameGuard::install(HookFrame {
        lane,
        target,
        previous,
        hooks: Vec::new(),
        effects: FunctionComponentUpdateQueue::default(),
        has_passive_effect: false,
        error: None,
    });
    let result = component.render(props);
    let frame = guard
        .finish()
        .ok_or(ReconcileError::Hook(HookError::OutsideRender))?;

    let name = component.name();
    let fail = |source| ReconcileError::Component { name, source };
    if let Some(error) = frame.error {
        return Err(fail(error));
    }
    let children = result.map_err(fail)?;
    if let Some(expected) = expected {
        let rendered = frame.hooks.len();
        if rendered < expected {
            return Err(fail(HookError::FewerHooksThanPreviousRender {
                expected,
                rendered,
            }));
        }
    }
    Ok(RenderedComponent {
        children,
        hooks: frame.hooks,
        effects: frame.effects,
        has_passive_effect: frame.has_passive_effect,
    })
}

enum StateSlot<T> {
    Mount(Weak<dyn UpdateTarget>),
    Update {
        queue: Rc<StateQueue<T>>,
        base: T,
        disposed: Rc<Cell<bool>>,
        lane: Lane,
    },
}

/// Declares a state slot. `init` runs on the first render only.
pub fn use_state<T: Clone + 'static>(
    init: impl FnOnce() -> T,
) -> Result<(T, SetState<T>), HookError> {
    let slot = with_frame(|frame| {
        let index = frame.hooks.len();
        match frame.previous_hook()? {
            None => Ok(StateSlot::Mount(frame.target.clone())),
            Some(Hook::State(hook)) => {
                let base = hook
                    .memoized
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or(HookError::StateTypeMismatch { index })?;
                let queue = Rc::clone(&hook.queue)
                    .downcast::<StateQueue<T>>()
                    .map_err(|_| HookError::StateTypeMismatch { index })?;
                Ok(StateSlot::Update {
                    queue,
                    base,
                    disposed: Rc::clone(&hook.disposed),
                    lane: frame.lane,
                })
            }
            Some(other) => Err(HookError::HookKindMismatch {
                index,
                expected: "state",
                found: other.kind(),
            }),
        }
    })?;

    // Initialisers and reducers are user code and run with no frame borrowed.
    let (state, queue, disposed) = match slot {
        StateSlot::Mount(target) => {
            let state = init();
            let disposed = Rc::new(Cell::new(false));
            let queue = Rc::new(StateQueue {
                updates: RefCell::new(UpdateQueue::new()),
                disposed: Rc::clone(&disposed),
                target,
            });
            (state, queue, disposed)
        }
        StateSlot::Update {
            queue,
            base,
            disposed,
            lane,
        } => {
            let work = queue.updates.borrow_mut().take_work();
            let base = work.base_state.unwrap_or(base);
            let processed = process_update_queue(base, work.updates, lane);
            if let Some(carried) = processed.carried {
                queue.updates.borrow_mut().carry(carried);
            }
            (processed.memoized_state, queue, disposed)
        }
    };

    let hook = Hook::State(StateHook {
        memoized: Rc::new(state.clone()),
        queue: Rc::clone(&queue) as Rc<dyn Any>,
        disposed,
    });
    with_frame(|frame| {
        frame.hooks.push(hook);
        Ok(())
    })?;
    Ok((state, SetState { queue }))
}

/// State slot driven by a reducer. The reducer runs lazily, when the
/// component next renders.
pub fn use_reducer<S, A, R>(
    reducer: R,
    init: impl FnOnce() -> S,
) -> Result<(S, Dispatch<A>), HookError>
where
    S: Clone + 'static,
    A: Clone + 'static,
    R: Fn(&S, A) -> S + 'static,
{
    let (state, set_state) = use_state(init)?;
    let reducer = Rc::new(reducer);
    let dispatch = Dispatch {
        inner: Rc::new(move |action: A, lane: Lane| {
            let reducer = Rc::clone(&reducer);
            set_state.update_with_lane(move |state| reducer(state, action.clone()), lane);
        }),
    };
    Ok((state, dispatch))
}

/// Declares a passive effect, run after the render is committed.
///
/// The effect fires after the first render and again whenever `deps`
/// differ from the previous render; its cleanup runs before it fires again
/// and when the component unmounts.
pub fn use_effect<F>(deps: Deps, create: F) -> Result<(), HookError>
where
    F: FnOnce() -> EffectCleanup + 'static,
{
    with_frame(|frame| {
        let index = frame.hooks.len();
        let (instance, changed) = match frame.previous_hook()? {
            None => (Rc::new(EffectInstance::default()), true),
            Some(Hook::Effect(previous)) => {
                let previous = previous.borrow();
                (Rc::clone(&previous.instance), deps.changed_from(previous.deps))
            }
            Some(other) => {
                return Err(HookError::HookKindMismatch {
                    index,
                    expected: "effect",
                    found: other.kind(),
                })
            }
        };
        let mut tag = HookFlags::PASSIVE;
        if changed {
            tag |= HookFlags::HAS_EFFECT;
            frame.has_passive_effect = true;
        }
        let effect = Rc::new(RefCell::new(Effect {
            tag,
            create: Some(Box::new(create)),
            deps,
            instance,
        }));
        frame.effects.effects.push(Rc::clone(&effect));
        frame.hooks.push(Hook::Effect(effect));
        Ok(())
    })
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
