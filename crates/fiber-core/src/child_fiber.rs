//! Child reconciliation: turns the old child chain of a fiber plus the
//! element its render produced into the new child chain.

use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::element::{Element, ElementNode, ElementType, Key};
use crate::error::ReconcileError;
use crate::fiber::{
    create_fiber_from_element, create_fiber_from_fragment, create_fiber_from_text,
    create_work_in_progress, FiberArena, FiberId, FiberProps, WorkTag,
};
use crate::flags::Flags;

/// Identity of an old child during list reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

/// Reconciler for the children of one parent fiber.
///
/// With `should_track_effects` off (the parent is mounting) nothing is
/// flagged: the whole subtree is attached at once by its top-most
/// placement.
pub(crate) struct ChildReconciler {
    should_track_effects: bool,
}

impl ChildReconciler {
    pub(crate) fn tracking() -> Self {
        Self {
            should_track_effects: true,
        }
    }

    pub(crate) fn mounting() -> Self {
        Self {
            should_track_effects: false,
        }
    }

    /// Reconciles `new_child` against the chain starting at
    /// `current_first_child` and returns the first new child.
    pub(crate) fn reconcile_child_fibers(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        current_first_child: Option<FiberId>,
        new_child: &Element,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let new_child = match new_child {
            Element::Node(node)
                if node.key.is_none() && node.element_type == ElementType::Fragment =>
            {
                node.props.children()
            }
            other => other,
        };

        match new_child {
            Element::Node(node) => {
                let fiber =
                    self.reconcile_single_element(arena, parent, current_first_child, node)?;
                self.place_single_child(arena, fiber)
            }
            Element::Text(content) => {
                let fiber =
                    self.reconcile_single_text(arena, parent, current_first_child, content)?;
                self.place_single_child(arena, fiber)
            }
            Element::List(children) => {
                self.reconcile_children_array(arena, parent, current_first_child, children)
            }
            Element::Empty => {
                self.delete_remaining_children(arena, parent, current_first_child)?;
                Ok(None)
            }
        }
    }

    fn delete_child(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        child: FiberId,
    ) -> Result<(), ReconcileError> {
        if !self.should_track_effects {
            return Ok(());
        }
        let parent = arena.get_mut(parent)?;
        parent.deletions.push(child);
        parent.flags |= Flags::CHILD_DELETION;
        Ok(())
    }

    fn delete_remaining_children(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        first: Option<FiberId>,
    ) -> Result<(), ReconcileError> {
        if !self.should_track_effects {
            return Ok(());
        }
        let mut next = first;
        while let Some(child) = next {
            self.delete_child(arena, parent, child)?;
            next = arena.get(child)?.sibling;
        }
        Ok(())
    }

    /// Clones `current` for this pass as the only child of its slot.
    fn use_fiber(
        &self,
        arena: &mut FiberArena,
        current: FiberId,
        pending_props: FiberProps,
    ) -> Result<FiberId, ReconcileError> {
        let clone = create_work_in_progress(arena, current, pending_props)?;
        let fiber = arena.get_mut(clone)?;
        fiber.index = 0;
        fiber.sibling = None;
        Ok(clone)
    }

    fn reconcile_single_element(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        current_first_child: Option<FiberId>,
        element: &ElementNode,
    ) -> Result<FiberId, ReconcileError> {
        let mut current = current_first_child;
        while let Some(candidate) = current {
            let fiber = arena.get(candidate)?;
            let sibling = fiber.sibling;
            if fiber.key == element.key {
                if fiber.element_type.as_ref() == Some(&element.element_type) {
                    let existing = self.use_fiber(arena, candidate, props_for(element))?;
                    arena.get_mut(existing)?.parent = Some(parent);
                    self.delete_remaining_children(arena, parent, sibling)?;
                    return Ok(existing);
                }
                // Same key, different type: nothing below can match either.
                self.delete_remaining_children(arena, parent, Some(candidate))?;
                break;
            }
            self.delete_child(arena, parent, candidate)?;
            current = sibling;
        }

        let fiber = create_fiber_from_element(arena, element);
        arena.get_mut(fiber)?.parent = Some(parent);
        Ok(fiber)
    }

    fn reconcile_single_text(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        current_first_child: Option<FiberId>,
        content: &Rc<str>,
    ) -> Result<FiberId, ReconcileError> {
        let mut current = current_first_child;
        while let Some(candidate) = current {
            let fiber = arena.get(candidate)?;
            let sibling = fiber.sibling;
            if fiber.tag == WorkTag::HostText {
                let existing =
                    self.use_fiber(arena, candidate, FiberProps::Text(content.clone()))?;
                arena.get_mut(existing)?.parent = Some(parent);
                self.delete_remaining_children(arena, parent, sibling)?;
                return Ok(existing);
            }
            self.delete_child(arena, parent, candidate)?;
            current = sibling;
        }

        let fiber = create_fiber_from_text(arena, content.clone());
        arena.get_mut(fiber)?.parent = Some(parent);
        Ok(fiber)
    }

    fn place_single_child(
        &self,
        arena: &mut FiberArena,
        fiber: FiberId,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let new_fiber = arena.get_mut(fiber)?;
        if self.should_track_effects && new_fiber.alternate.is_none() {
            new_fiber.flags |= Flags::PLACEMENT;
        }
        Ok(Some(fiber))
    }

    fn reconcile_children_array(
        &self,
        arena: &mut FiberArena,
        parent: FiberId,
        current_first_child: Option<FiberId>,
        new_children: &[Element],
    ) -> Result<Option<FiberId>, ReconcileError> {
        let mut last_placed_index = 0;
        let mut first_new_fiber: Option<FiberId> = None;
        let mut last_new_fiber: Option<FiberId> = None;

        // Old children in sibling order, and how to find them by key.
        let mut old_children = Vec::new();
        let mut existing_children: HashMap<ChildKey, FiberId> = HashMap::new();
        // Earlier children hidden by a later one with the same key.
        let mut shadowed = Vec::new();
        let mut current = current_first_child;
        while let Some(child) = current {
            let fiber = arena.get(child)?;
            let key = match fiber.key {
                Some(key) => ChildKey::Key(key),
                None => ChildKey::Index(fiber.index),
            };
            if let Some(previous) = existing_children.insert(key, child) {
                log::warn!(
                    "duplicate child key {key:?} under {}; dropping the earlier child",
                    arena.get(parent)?.label()
                );
                shadowed.push(previous);
            }
            old_children.push(child);
            current = fiber.sibling;
        }

        for (index, element) in new_children.iter().enumerate() {
            let Some(new_fiber) =
                self.update_from_map(arena, &mut existing_children, index, element)?
            else {
                continue;
            };

            let fiber = arena.get_mut(new_fiber)?;
            fiber.index = index;
            fiber.parent = Some(parent);
            fiber.sibling = None;
            let alternate = fiber.alternate;

            match last_new_fiber {
                None => first_new_fiber = Some(new_fiber),
                Some(previous) => arena.get_mut(previous)?.sibling = Some(new_fiber),
            }
            last_new_fiber = Some(new_fiber);

            if !self.should_track_effects {
                continue;
            }
            match alternate {
                Some(current) => {
                    let old_index = arena.get(current)?.index;
                    if old_index < last_placed_index {
                        // Moved right past a node that kept its place.
                        arena.get_mut(new_fiber)?.flags |= Flags::PLACEMENT;
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => arena.get_mut(new_fiber)?.flags |= Flags::PLACEMENT,
            }
        }

        // Whatever was not claimed is deleted, in old sibling order.
        let unmatched: HashSet<FiberId> = existing_children
            .into_values()
            .chain(shadowed)
            .collect();
        for old in old_children {
            if unmatched.contains(&old) {
                self.delete_child(arena, parent, old)?;
            }
        }
        Ok(first_new_fiber)
    }

    fn update_from_map(
        &self,
        arena: &mut FiberArena,
        existing_children: &mut HashMap<ChildKey, FiberId>,
        index: usize,
        element: &Element,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let key_to_use = match element.key() {
            Some(key) => ChildKey::Key(key),
            None => ChildKey::Index(index),
        };
        let before = existing_children.get(&key_to_use).copied();

        match element {
            Element::Text(content) => {
                if let Some(before) = before {
                    if arena.get(before)?.tag == WorkTag::HostText {
                        existing_children.remove(&key_to_use);
                        let props = FiberProps::Text(content.clone());
                        return self.use_fiber(arena, before, props).map(Some);
                    }
                }
                Ok(Some(create_fiber_from_text(arena, content.clone())))
            }
            Element::Node(node) => {
                if node.element_type == ElementType::Fragment {
                    let children = node.props.children().clone();
                    return self
                        .update_fragment(
                            arena,
                            before,
                            children,
                            node.key,
                            key_to_use,
                            existing_children,
                        )
                        .map(Some);
                }
                if let Some(before) = before {
                    if arena.get(before)?.element_type.as_ref() == Some(&node.element_type) {
                        existing_children.remove(&key_to_use);
                        return self.use_fiber(arena, before, props_for(node)).map(Some);
                    }
                }
                Ok(Some(create_fiber_from_element(arena, node)))
            }
            Element::List(_) => self
                .update_fragment(
                    arena,
                    before,
                    element.clone(),
                    None,
                    key_to_use,
                    existing_children,
                )
                .map(Some),
            Element::Empty => Ok(None),
        }
    }

    fn update_fragment(
        &self,
        arena: &mut FiberArena,
        current: Option<FiberId>,
        children: Element,
        key: Option<Key>,
        key_to_use: ChildKey,
        existing_children: &mut HashMap<ChildKey, FiberId>,
    ) -> Result<FiberId, ReconcileError> {
        if let Some(current) = current {
            if arena.get(current)?.tag == WorkTag::Fragment {
                existing_children.remove(&key_to_use);
                return self.use_fiber(arena, current, FiberProps::Fragment(children));
            }
        }
        Ok(create_fiber_from_fragment(arena, children, key))
    }
}

fn props_for(element: &ElementNode) -> FiberProps {
    match element.element_type {
        ElementType::Fragment => FiberProps::Fragment(element.props.children().clone()),
        _ => FiberProps::Element(element.props.clone()),
    }
}

#[cfg(test)]
#[path = "tests/child_fiber_tests.rs"]
mod tests;
