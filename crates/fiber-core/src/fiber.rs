//! Fiber records and the arena that owns them.
//!
//! A fiber is one tree position for one render generation. Each position
//! has at most two fibers alive at a time, cross-linked through
//! `alternate`: the committed one reachable from the root's `current`
//! pointer and the work-in-progress copy being built by a render pass.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::element::{Element, ElementNode, ElementType, Key, PropChange, Props};
use crate::error::ReconcileError;
use crate::flags::{Flags, NO_FLAGS};
use crate::hooks::{FunctionComponentUpdateQueue, Hook};
use crate::host::HostNodeId;
use crate::update_queue::UpdateQueue;

pub type FiberId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkTag {
    HostRoot,
    HostComponent,
    HostText,
    FunctionComponent,
    Fragment,
}

/// Input of a fiber for the pass that is building it.
#[derive(Clone, Debug, Default)]
pub enum FiberProps {
    #[default]
    Empty,
    Element(Props),
    Text(Rc<str>),
    /// Children of a fragment, which has no props of its own.
    Fragment(Element),
}

impl FiberProps {
    pub fn text(&self) -> Option<&Rc<str>> {
        match self {
            FiberProps::Text(content) => Some(content),
            _ => None,
        }
    }

    pub fn element_props(&self) -> Option<&Props> {
        match self {
            FiberProps::Element(props) => Some(props),
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
pub enum MemoizedState {
    #[default]
    None,
    /// The element last rendered into a root.
    Element(Element),
    /// Hook list of a function component, in call order.
    Hooks(Vec<Hook>),
}

#[derive(Clone, Default)]
pub enum FiberUpdateQueue {
    #[default]
    None,
    /// Shared between both generations of the root fiber.
    Root(Rc<RefCell<UpdateQueue<Element>>>),
    Function(FunctionComponentUpdateQueue),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StateNode {
    #[default]
    None,
    Host(HostNodeId),
    /// The root fiber; its host node is the root's container.
    Root,
}

impl StateNode {
    pub fn host(self) -> Option<HostNodeId> {
        match self {
            StateNode::Host(id) => Some(id),
            _ => None,
        }
    }
}

pub struct Fiber {
    pub tag: WorkTag,
    pub key: Option<Key>,
    pub element_type: Option<ElementType>,
    pub pending_props: FiberProps,
    pub memoized_props: FiberProps,
    pub memoized_state: MemoizedState,
    pub update_queue: FiberUpdateQueue,
    pub flags: Flags,
    pub subtree_flags: Flags,
    pub state_node: StateNode,
    /// Attribute changes computed by complete work, applied on commit.
    pub update_payload: Vec<PropChange>,
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub index: usize,
    pub deletions: Vec<FiberId>,
    pub alternate: Option<FiberId>,
}

impl Fiber {
    pub fn new(tag: WorkTag, pending_props: FiberProps, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            pending_props,
            memoized_props: FiberProps::Empty,
            memoized_state: MemoizedState::None,
            update_queue: FiberUpdateQueue::None,
            flags: NO_FLAGS,
            subtree_flags: NO_FLAGS,
            state_node: StateNode::None,
            update_payload: Vec::new(),
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            deletions: Vec::new(),
            alternate: None,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.tag, WorkTag::HostComponent | WorkTag::HostText)
    }

    /// Short label used by logs and tree dumps.
    pub fn label(&self) -> String {
        match (&self.tag, &self.element_type) {
            (WorkTag::HostRoot, _) => "#root".to_string(),
            (WorkTag::HostText, _) => match self.pending_props.text() {
                Some(content) => format!("#text {content:?}"),
                None => "#text".to_string(),
            },
            (_, Some(element_type)) => element_type.name().to_string(),
            (_, None) => format!("{:?}", self.tag),
        }
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .field("state_node", &self.state_node)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("index", &self.index)
            .field("alternate", &self.alternate)
            .finish_non_exhaustive()
    }
}

/// Slot storage for fibers, addressed by [`FiberId`].
///
/// Released slots go on a free list and are handed out again. Every
/// allocation made since [`FiberArena::begin_pass`] is remembered so that a
/// failed render can give its fibers back.
#[derive(Default)]
pub struct FiberArena {
    slots: Vec<Option<Fiber>>,
    free: Vec<FiberId>,
    pass_allocations: Vec<FiberId>,
}

impl FiberArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, fiber: Fiber) -> FiberId {
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(fiber);
                id
            }
            None => {
                self.slots.push(Some(fiber));
                self.slots.len() - 1
            }
        };
        self.pass_allocations.push(id);
        id
    }

    pub fn get(&self, id: FiberId) -> Result<&Fiber, ReconcileError> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(ReconcileError::FiberMissing { id })
    }

    pub fn get_mut(&mut self, id: FiberId) -> Result<&mut Fiber, ReconcileError> {
        self.slots
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(ReconcileError::FiberMissing { id })
    }

    pub fn contains(&self, id: FiberId) -> bool {
        matches!(self.slots.get(id), Some(Some(_)))
    }

    /// Frees a slot. Its twin, if still alive, forgets about it.
    pub fn release(&mut self, id: FiberId) {
        let Some(fiber) = self.slots.get_mut(id).and_then(Option::take) else {
            return;
        };
        if let Some(alternate) = fiber.alternate {
            if let Some(Some(twin)) = self.slots.get_mut(alternate) {
                if twin.alternate == Some(id) {
                    twin.alternate = None;
                }
            }
        }
        self.free.push(id);
    }

    pub fn begin_pass(&mut self) {
        self.pass_allocations.clear();
    }

    /// Keeps everything allocated by the pass that just committed.
    pub fn finish_pass(&mut self) {
        self.pass_allocations.clear();
    }

    /// Releases every fiber allocated by a pass that is being thrown away.
    pub fn discard_pass(&mut self) -> usize {
        let allocated = std::mem::take(&mut self.pass_allocations);
        let mut released = 0;
        for id in allocated {
            if self.contains(id) {
                self.release(id);
                released += 1;
            }
        }
        released
    }

    /// Number of live fibers, across both generations.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self, id: FiberId) -> Result<Vec<FiberId>, ReconcileError> {
        let mut children = Vec::new();
        let mut next = self.get(id)?.child;
        while let Some(child) = next {
            children.push(child);
            next = self.get(child)?.sibling;
        }
        Ok(children)
    }

    pub fn dump_tree(&self, root: FiberId) -> String {
        let mut output = String::new();
        self.dump_fiber(&mut output, root, 0);
        output
    }

    fn dump_fiber(&self, output: &mut String, id: FiberId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.get(id) {
            Ok(fiber) => {
                output.push_str(&format!("{}[{}] {}", indent, id, fiber.label()));
                if let Some(host) = fiber.state_node.host() {
                    output.push_str(&format!(" host={host}"));
                }
                output.push('\n');
                let mut next = fiber.child;
                while let Some(child) = next {
                    self.dump_fiber(output, child, depth + 1);
                    next = self.get(child).ok().and_then(|fiber| fiber.sibling);
                }
            }
            Err(_) => output.push_str(&format!("{}[{}] (released)\n", indent, id)),
        }
    }
}

/// Returns the work-in-progress twin of `current`, reusing the alternate
/// fiber when one exists.
pub fn create_work_in_progress(
    arena: &mut FiberArena,
    current: FiberId,
    pending_props: FiberProps,
) -> Result<FiberId, ReconcileError> {
    let source = arena.get(current)?;
    let element_type = source.element_type.clone();
    let update_queue = source.update_queue.clone();
    let child = source.child;
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let (tag, key, state_node) = (source.tag, source.key, source.state_node);

    let wip = match source.alternate {
        Some(alternate) => {
            let fiber = arena.get_mut(alternate)?;
            fiber.pending_props = pending_props;
            fiber.flags = NO_FLAGS;
            fiber.subtree_flags = NO_FLAGS;
            fiber.deletions.clear();
            fiber.update_payload.clear();
            alternate
        }
        None => {
            let mut fiber = Fiber::new(tag, pending_props, key);
            fiber.state_node = state_node;
            fiber.alternate = Some(current);
            let wip = arena.alloc(fiber);
            arena.get_mut(current)?.alternate = Some(wip);
            wip
        }
    };

    let fiber = arena.get_mut(wip)?;
    fiber.element_type = element_type;
    fiber.update_queue = update_queue;
    fiber.child = child;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    Ok(wip)
}

pub fn create_fiber_from_element(arena: &mut FiberArena, node: &ElementNode) -> FiberId {
    let (tag, pending_props) = match &node.element_type {
        ElementType::Host(_) => (WorkTag::HostComponent, FiberProps::Element(node.props.clone())),
        ElementType::Component(_) => (
            WorkTag::FunctionComponent,
            FiberProps::Element(node.props.clone()),
        ),
        ElementType::Fragment => (
            WorkTag::Fragment,
            FiberProps::Fragment(node.props.children().clone()),
        ),
    };
    let mut fiber = Fiber::new(tag, pending_props, node.key);
    fiber.element_type = Some(node.element_type.clone());
    arena.alloc(fiber)
}

pub fn create_fiber_from_text(arena: &mut FiberArena, content: Rc<str>) -> FiberId {
    arena.alloc(Fiber::new(WorkTag::HostText, FiberProps::Text(content), None))
}

pub fn create_fiber_from_fragment(
    arena: &mut FiberArena,
    children: Element,
    key: Option<Key>,
) -> FiberId {
    let mut fiber = Fiber::new(WorkTag::Fragment, FiberProps::Fragment(children), key);
    fiber.element_type = Some(ElementType::Fragment);
    arena.alloc(fiber)
}

pub fn create_host_root_fiber(
    arena: &mut FiberArena,
    queue: Rc<RefCell<UpdateQueue<Element>>>,
) -> FiberId {
    let mut fiber = Fiber::new(WorkTag::HostRoot, FiberProps::Empty, None);
    fiber.state_node = StateNode::Root;
    fiber.update_queue = FiberUpdateQueue::Root(queue);
    arena.alloc(fiber)
}

#[cfg(test)]
#[path = "tests/fiber_tests.rs"]
mod tests;
