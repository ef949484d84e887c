//! Top-down visit of the render pass.

use crate::child_fiber::ChildReconciler;
use crate::element::{Element, ElementType};
use crate::error::ReconcileError;
use crate::fiber::{FiberArena, FiberId, FiberProps, FiberUpdateQueue, MemoizedState, WorkTag};
use crate::flags::Flags;
use crate::hooks::render_with_hooks;
use crate::update_queue::process_update_queue;
use crate::work_loop::RenderContext;

/// Processes `wip` and returns its first child, if the walk should descend.
pub(crate) fn begin_work(
    ctx: &mut RenderContext<'_>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let tag = ctx.arena.get(wip)?.tag;
    log::trace!("begin work on fiber {wip} ({tag:?})");
    match tag {
        WorkTag::HostRoot => update_host_root(ctx, wip),
        WorkTag::HostComponent => update_host_component(ctx, wip),
        WorkTag::HostText => Ok(None),
        WorkTag::FunctionComponent => update_function_component(ctx, wip),
        WorkTag::Fragment => update_fragment(ctx, wip),
    }
}

fn update_host_root(
    ctx: &mut RenderContext<'_>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let fiber = ctx.arena.get(wip)?;
    let FiberUpdateQueue::Root(queue) = &fiber.update_queue else {
        log::warn!("root fiber {wip} has no update queue");
        return Ok(None);
    };
    let queue = queue.clone();
    let memoized = match &fiber.memoized_state {
        MemoizedState::Element(element) => element.clone(),
        _ => Element::Empty,
    };

    let work = queue.borrow_mut().take_work();
    let base_state = work.base_state.unwrap_or(memoized);
    let processed = process_update_queue(base_state, work.updates, ctx.lane);
    if let Some(carried) = processed.carried {
        queue.borrow_mut().carry(carried);
    }
    let next_children = processed.memoized_state;
    ctx.arena.get_mut(wip)?.memoized_state = MemoizedState::Element(next_children.clone());

    reconcile_children(ctx.arena, wip, &next_children)?;
    Ok(ctx.arena.get(wip)?.child)
}

fn update_host_component(
    ctx: &mut RenderContext<'_>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let Some(props) = ctx.arena.get(wip)?.pending_props.element_props().cloned() else {
        log::warn!("host fiber {wip} has no element props; rendering nothing");
        return Ok(None);
    };
    reconcile_children(ctx.arena, wip, props.children())?;
    Ok(ctx.arena.get(wip)?.child)
}

fn update_fragment(
    ctx: &mut RenderContext<'_>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let children = match &ctx.arena.get(wip)?.pending_props {
        FiberProps::Fragment(children) => children.clone(),
        other => {
            log::warn!("fragment fiber {wip} has unexpected props {other:?}; rendering nothing");
            return Ok(None);
        }
    };
    reconcile_children(ctx.arena, wip, &children)?;
    Ok(ctx.arena.get(wip)?.child)
}

fn update_function_component(
    ctx: &mut RenderContext<'_>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let fiber = ctx.arena.get(wip)?;
    let Some(ElementType::Component(component)) = fiber.element_type.clone() else {
        log::warn!("function fiber {wip} has no component type; rendering nothing");
        return Ok(None);
    };
    let props = fiber
        .pending_props
        .element_props()
        .cloned()
        .unwrap_or_default();
    let previous = fiber.alternate.map(|_| match &fiber.memoized_state {
        MemoizedState::Hooks(hooks) => hooks.clone(),
        _ => Vec::new(),
    });

    let rendered = render_with_hooks(component, &props, previous, ctx.lane, ctx.target.clone())?;

    let fiber = ctx.arena.get_mut(wip)?;
    fiber.memoized_state = MemoizedState::Hooks(rendered.hooks);
    fiber.update_queue = FiberUpdateQueue::Function(rendered.effects);
    if rendered.has_passive_effect {
        fiber.flags |= Flags::PASSIVE_EFFECT;
    }
    reconcile_children(ctx.arena, wip, &rendered.children)?;
    Ok(ctx.arena.get(wip)?.child)
}

/// Diffs against the committed children when `wip` has a committed twin,
/// otherwise mounts them without tracking placements or deletions.
fn reconcile_children(
    arena: &mut FiberArena,
    wip: FiberId,
    children: &Element,
) -> Result<(), ReconcileError> {
    let current_child = match arena.get(wip)?.alternate {
        Some(current) => Some(arena.get(current)?.child),
        None => None,
    };
    let child = match current_child {
        Some(current_first_child) => ChildReconciler::tracking().reconcile_child_fibers(
            arena,
            wip,
            current_first_child,
            children,
        )?,
        None => ChildReconciler::mounting().reconcile_child_fibers(arena, wip, None, children)?,
    };
    arena.get_mut(wip)?.child = child;
    Ok(())
}
