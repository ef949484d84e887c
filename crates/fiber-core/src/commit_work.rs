//! Commit phase: applies the flags of a finished tree to the host and
//! queues passive effects.

use crate::element::Key;
use crate::error::ReconcileError;
use crate::fiber::{FiberArena, FiberId, FiberUpdateQueue, MemoizedState, WorkTag};
use crate::flags::{Flags, HookFlags};
use crate::hooks::{dispose_hooks, Effect, EffectRef};
use crate::host::{Host, HostNodeId, HostUpdate};
use crate::lanes::Lane;

/// Effects queued by commit for the next passive flush.
#[derive(Default)]
pub(crate) struct PendingPassiveEffects {
    /// Effects of unmounted components: destroy only.
    pub(crate) unmount: Vec<EffectRef>,
    /// Effects of rendered components: destroy, then create, where flagged.
    pub(crate) update: Vec<EffectRef>,
}

impl PendingPassiveEffects {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }

    /// Runs every pending destroy before any create. Returns whether there
    /// was anything to run.
    pub(crate) fn flush(self) -> bool {
        if self.is_empty() {
            return false;
        }
        let passive = HookFlags::PASSIVE;
        let fired = HookFlags::PASSIVE | HookFlags::HAS_EFFECT;
        for effect in &self.unmount {
            if effect.borrow().has_tag(passive) {
                Effect::run_destroy(effect);
            }
        }
        for effect in &self.update {
            if effect.borrow().has_tag(fired) {
                Effect::run_destroy(effect);
            }
        }
        for effect in &self.update {
            if effect.borrow().has_tag(fired) {
                Effect::run_create(effect);
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitEffectKind {
    Placement,
    Update,
    Deletion,
    Passive,
}

/// One fiber touched by a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedEffect {
    pub kind: CommitEffectKind,
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub label: String,
}

/// What the latest commit of a root did, fiber by fiber, in commit order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub lane: Lane,
    pub effects: Vec<CommittedEffect>,
}

impl CommitReport {
    pub(crate) fn new(lane: Lane) -> Self {
        Self {
            lane,
            effects: Vec::new(),
        }
    }

    pub fn of_kind(&self, kind: CommitEffectKind) -> impl Iterator<Item = &CommittedEffect> {
        self.effects.iter().filter(move |effect| effect.kind == kind)
    }

    pub fn count(&self, kind: CommitEffectKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Placements, updates and deletions; passive effects are not host
    /// mutations.
    pub fn mutation_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| effect.kind != CommitEffectKind::Passive)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

pub(crate) struct CommitContext<'a> {
    pub(crate) arena: &'a mut FiberArena,
    pub(crate) host: &'a mut dyn Host,
    pub(crate) container: HostNodeId,
    pub(crate) passive: &'a mut PendingPassiveEffects,
    pub(crate) report: &'a mut CommitReport,
}

impl CommitContext<'_> {
    fn record(&mut self, kind: CommitEffectKind, fiber: FiberId) -> Result<(), ReconcileError> {
        let fiber = self.arena.get(fiber)?;
        self.report.effects.push(CommittedEffect {
            kind,
            tag: fiber.tag,
            key: fiber.key,
            label: fiber.label(),
        });
        Ok(())
    }
}

/// Walks the finished tree child-before-parent, skipping subtrees whose
/// `subtree_flags` carry nothing to commit.
pub(crate) fn commit_mutation_effects(
    ctx: &mut CommitContext<'_>,
    finished_work: FiberId,
) -> Result<(), ReconcileError> {
    let mask = Flags::MUTATION_MASK | Flags::PASSIVE_MASK;
    let mut next = Some(finished_work);
    while let Some(fiber_id) = next {
        let fiber = ctx.arena.get(fiber_id)?;
        match fiber.child {
            Some(child) if fiber.subtree_flags.intersects(mask) => next = Some(child),
            _ => {
                next = None;
                let mut node = fiber_id;
                loop {
                    commit_mutation_effects_on_fiber(ctx, node)?;
                    if node == finished_work {
                        break;
                    }
                    let fiber = ctx.arena.get(node)?;
                    if let Some(sibling) = fiber.sibling {
                        next = Some(sibling);
                        break;
                    }
                    match fiber.parent {
                        Some(parent) => node = parent,
                        None => break,
                    }
                }
            }
        }
    }
    Ok(())
}

fn commit_mutation_effects_on_fiber(
    ctx: &mut CommitContext<'_>,
    fiber_id: FiberId,
) -> Result<(), ReconcileError> {
    let flags = ctx.arena.get(fiber_id)?.flags;

    if flags.contains(Flags::PLACEMENT) {
        commit_placement(ctx, fiber_id)?;
        ctx.record(CommitEffectKind::Placement, fiber_id)?;
        ctx.arena.get_mut(fiber_id)?.flags.remove(Flags::PLACEMENT);
    }
    if flags.contains(Flags::UPDATE) {
        commit_update(ctx, fiber_id)?;
        ctx.record(CommitEffectKind::Update, fiber_id)?;
        ctx.arena.get_mut(fiber_id)?.flags.remove(Flags::UPDATE);
    }
    if flags.contains(Flags::CHILD_DELETION) {
        let deletions = std::mem::take(&mut ctx.arena.get_mut(fiber_id)?.deletions);
        for child in deletions {
            commit_deletion(ctx, child)?;
        }
        ctx.arena.get_mut(fiber_id)?.flags.remove(Flags::CHILD_DELETION);
    }
    if flags.contains(Flags::PASSIVE_EFFECT) {
        if let FiberUpdateQueue::Function(queue) = &ctx.arena.get(fiber_id)?.update_queue {
            ctx.passive.update.extend(queue.effects().iter().cloned());
        }
        ctx.record(CommitEffectKind::Passive, fiber_id)?;
        ctx.arena.get_mut(fiber_id)?.flags.remove(Flags::PASSIVE_EFFECT);
    }
    Ok(())
}

fn commit_placement(ctx: &mut CommitContext<'_>, fiber_id: FiberId) -> Result<(), ReconcileError> {
    let Some(parent) = host_parent(ctx, fiber_id)? else {
        log::error!("fiber {fiber_id} has no host parent; placement skipped");
        return Ok(());
    };
    let before = host_sibling(ctx.arena, fiber_id)?;
    insert_or_append_placement_node(ctx, fiber_id, parent, before)
}

/// Host node of the nearest host ancestor; the container for the root.
fn host_parent(ctx: &CommitContext<'_>, fiber_id: FiberId) -> Result<Option<HostNodeId>, ReconcileError> {
    let mut parent = ctx.arena.get(fiber_id)?.parent;
    while let Some(id) = parent {
        let fiber = ctx.arena.get(id)?;
        match fiber.tag {
            WorkTag::HostComponent => return Ok(fiber.state_node.host()),
            WorkTag::HostRoot => return Ok(Some(ctx.container)),
            _ => parent = fiber.parent,
        }
    }
    Ok(None)
}

/// First host node after `fiber_id` that is already in place, searching
/// through non-host wrappers but never past the host parent.
fn host_sibling(arena: &FiberArena, fiber_id: FiberId) -> Result<Option<HostNodeId>, ReconcileError> {
    let mut node = fiber_id;
    'siblings: loop {
        let sibling = loop {
            let fiber = arena.get(node)?;
            if let Some(sibling) = fiber.sibling {
                break sibling;
            }
            let Some(parent) = fiber.parent else {
                return Ok(None);
            };
            if matches!(arena.get(parent)?.tag, WorkTag::HostComponent | WorkTag::HostRoot) {
                return Ok(None);
            }
            node = parent;
        };

        node = sibling;
        loop {
            let fiber = arena.get(node)?;
            if fiber.is_host() {
                break;
            }
            // A placed wrapper is moving too, so nothing inside it is stable.
            if fiber.flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match fiber.child {
                Some(child) => node = child,
                None => continue 'siblings,
            }
        }

        let fiber = arena.get(node)?;
        if !fiber.flags.contains(Flags::PLACEMENT) {
            return Ok(fiber.state_node.host());
        }
    }
}

fn insert_or_append_placement_node(
    ctx: &mut CommitContext<'_>,
    fiber_id: FiberId,
    parent: HostNodeId,
    before: Option<HostNodeId>,
) -> Result<(), ReconcileError> {
    let fiber = ctx.arena.get(fiber_id)?;
    if fiber.is_host() {
        if let Some(node) = fiber.state_node.host() {
            match before {
                Some(before) => ctx.host.insert_before(parent, node, before),
                None => ctx.host.append_child(parent, node),
            }
        }
        return Ok(());
    }
    let mut child = fiber.child;
    while let Some(id) = child {
        insert_or_append_placement_node(ctx, id, parent, before)?;
        child = ctx.arena.get(id)?.sibling;
    }
    Ok(())
}

fn commit_update(ctx: &mut CommitContext<'_>, fiber_id: FiberId) -> Result<(), ReconcileError> {
    let fiber = ctx.arena.get_mut(fiber_id)?;
    let Some(node) = fiber.state_node.host() else {
        log::warn!("update flagged on fiber {fiber_id} without a host node");
        return Ok(());
    };
    let update = match fiber.tag {
        WorkTag::HostText => match fiber.memoized_props.text() {
            Some(content) => HostUpdate::Text(content.clone()),
            None => return Ok(()),
        },
        WorkTag::HostComponent => {
            let tag = fiber
                .element_type
                .as_ref()
                .map(|element_type| element_type.name().into())
                .unwrap_or_else(|| "".into());
            HostUpdate::Attributes {
                tag,
                changes: std::mem::take(&mut fiber.update_payload),
            }
        }
        _ => return Ok(()),
    };
    ctx.host.commit_update(node, update);
    Ok(())
}

/// Unmounts the subtree rooted at `deleted`: detaches its top-level host
/// nodes, queues the destroys of every component's effects, and releases
/// its fibers.
fn commit_deletion(ctx: &mut CommitContext<'_>, deleted: FiberId) -> Result<(), ReconcileError> {
    ctx.record(CommitEffectKind::Deletion, deleted)?;
    let parent = host_parent(ctx, deleted)?;

    let subtree = collect_post_order(ctx.arena, deleted)?;
    for &fiber_id in &subtree {
        let fiber = ctx.arena.get(fiber_id)?;
        if fiber.tag != WorkTag::FunctionComponent {
            continue;
        }
        if let FiberUpdateQueue::Function(queue) = &fiber.update_queue {
            ctx.passive.unmount.extend(queue.effects().iter().cloned());
        }
        if let MemoizedState::Hooks(hooks) = &fiber.memoized_state {
            dispose_hooks(hooks);
        }
    }

    let host_children = collect_host_children(ctx.arena, deleted)?;
    match parent {
        Some(parent) => {
            for child in host_children {
                ctx.host.remove_child(parent, child);
            }
        }
        None if !host_children.is_empty() => {
            log::error!("deleted fiber {deleted} has no host parent; host nodes left attached");
        }
        None => {}
    }

    for fiber_id in subtree {
        let alternate = ctx.arena.get(fiber_id)?.alternate;
        ctx.arena.release(fiber_id);
        if let Some(alternate) = alternate {
            ctx.arena.release(alternate);
        }
    }
    Ok(())
}

/// Fibers of the subtree rooted at `root`, children before their parent.
fn collect_post_order(arena: &FiberArena, root: FiberId) -> Result<Vec<FiberId>, ReconcileError> {
    let mut order = Vec::new();
    let mut node = root;
    'descend: loop {
        while let Some(child) = arena.get(node)?.child {
            node = child;
        }
        loop {
            order.push(node);
            if node == root {
                return Ok(order);
            }
            let fiber = arena.get(node)?;
            if let Some(sibling) = fiber.sibling {
                node = sibling;
                continue 'descend;
            }
            match fiber.parent {
                Some(parent) => node = parent,
                None => return Ok(order),
            }
        }
    }
}

/// Host nodes of the subtree that are not nested in another host node of
/// the same subtree, in tree order.
fn collect_host_children(
    arena: &FiberArena,
    root: FiberId,
) -> Result<Vec<HostNodeId>, ReconcileError> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(fiber_id) = stack.pop() {
        let fiber = arena.get(fiber_id)?;
        if fiber.is_host() {
            found.extend(fiber.state_node.host());
            continue;
        }
        let children = arena.children(fiber_id)?;
        stack.extend(children.into_iter().rev());
    }
    Ok(found)
}
