//! Bottom-up visit of the render pass: host instances and flag bubbling.

use std::rc::Rc;

use crate::element::ElementType;
use crate::error::ReconcileError;
use crate::fiber::{FiberArena, FiberId, StateNode, WorkTag};
use crate::flags::{Flags, NO_FLAGS};
use crate::host::HostNodeId;
use crate::work_loop::RenderContext;

pub(crate) fn complete_work(ctx: &mut RenderContext<'_>, wip: FiberId) -> Result<(), ReconcileError> {
    let fiber = ctx.arena.get(wip)?;
    let current = fiber.alternate;
    let existing_instance = fiber.state_node.host();
    log::trace!("complete work on fiber {wip} ({:?})", fiber.tag);

    match fiber.tag {
        WorkTag::HostComponent => {
            let props = fiber.pending_props.element_props().cloned().unwrap_or_default();
            match (current, existing_instance) {
                (Some(current), Some(_)) => {
                    let previous = ctx
                        .arena
                        .get(current)?
                        .memoized_props
                        .element_props()
                        .cloned()
                        .unwrap_or_default();
                    let changes = previous.diff_attributes(&props);
                    if !changes.is_empty() {
                        let fiber = ctx.arena.get_mut(wip)?;
                        fiber.update_payload = changes;
                        fiber.flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let tag = match &fiber.element_type {
                        Some(ElementType::Host(tag)) => tag.clone(),
                        other => {
                            log::warn!("host fiber {wip} has element type {other:?}");
                            return bubble_properties(ctx.arena, wip);
                        }
                    };
                    let instance = ctx.host.create_element(&tag, &props);
                    append_all_children(ctx, instance, wip)?;
                    ctx.arena.get_mut(wip)?.state_node = StateNode::Host(instance);
                }
            }
        }
        WorkTag::HostText => {
            let content = fiber
                .pending_props
                .text()
                .cloned()
                .unwrap_or_else(|| Rc::from(""));
            match (current, existing_instance) {
                (Some(current), Some(_)) => {
                    let previous = ctx.arena.get(current)?.memoized_props.text().cloned();
                    if previous.as_deref() != Some(&*content) {
                        ctx.arena.get_mut(wip)?.flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let instance = ctx.host.create_text(&content);
                    ctx.arena.get_mut(wip)?.state_node = StateNode::Host(instance);
                }
            }
        }
        WorkTag::HostRoot | WorkTag::FunctionComponent | WorkTag::Fragment => {}
    }
    bubble_properties(ctx.arena, wip)
}

/// Appends the nearest host descendants of `wip` into `parent`. Deeper host
/// nodes were already appended into their own host ancestors.
fn append_all_children(
    ctx: &mut RenderContext<'_>,
    parent: HostNodeId,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let mut next = ctx.arena.get(wip)?.child;
    while let Some(node) = next {
        let fiber = ctx.arena.get(node)?;
        if fiber.is_host() {
            if let Some(child) = fiber.state_node.host() {
                ctx.host.append_child(parent, child);
            }
        } else if let Some(child) = fiber.child {
            next = Some(child);
            continue;
        }

        next = None;
        let mut climb = node;
        loop {
            let fiber = ctx.arena.get(climb)?;
            if let Some(sibling) = fiber.sibling {
                next = Some(sibling);
                break;
            }
            match fiber.parent {
                Some(parent_fiber) if parent_fiber != wip => climb = parent_fiber,
                _ => break,
            }
        }
    }
    Ok(())
}

/// Folds the children's flags into `subtree_flags` and repoints their
/// parent links at `wip`.
pub(crate) fn bubble_properties(arena: &mut FiberArena, wip: FiberId) -> Result<(), ReconcileError> {
    let mut subtree_flags = NO_FLAGS;
    let mut next = arena.get(wip)?.child;
    while let Some(child) = next {
        let fiber = arena.get_mut(child)?;
        subtree_flags |= fiber.subtree_flags | fiber.flags;
        fiber.parent = Some(wip);
        next = fiber.sibling;
    }
    arena.get_mut(wip)?.subtree_flags |= subtree_flags;
    Ok(())
}
