//! Host surface the reconciler renders into.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::element::{PropChange, PropValue, Props};

pub type HostNodeId = usize;

/// Change applied to an existing host node during commit.
#[derive(Clone, Debug, PartialEq)]
pub enum HostUpdate {
    Text(Rc<str>),
    Attributes {
        tag: Rc<str>,
        changes: Vec<PropChange>,
    },
}

/// Capabilities the reconciler needs from a host surface.
///
/// Nodes created during render are detached until commit inserts the
/// top-most new node of each subtree with [`Host::append_child`] or
/// [`Host::insert_before`].
pub trait Host {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostNodeId;
    fn create_text(&mut self, content: &str) -> HostNodeId;
    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId);
    /// Moves `child` in front of `before`; `child` may already be attached.
    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, before: HostNodeId);
    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId);
    fn commit_update(&mut self, node: HostNodeId, update: HostUpdate);
}

impl<H: Host + ?Sized> Host for Box<H> {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostNodeId {
        (**self).create_element(tag, props)
    }

    fn create_text(&mut self, content: &str) -> HostNodeId {
        (**self).create_text(content)
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        (**self).append_child(parent, child)
    }

    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        (**self).insert_before(parent, child, before)
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        (**self).remove_child(parent, child)
    }

    fn commit_update(&mut self, node: HostNodeId, update: HostUpdate) {
        (**self).commit_update(node, update)
    }
}

/// One call made on a [`MemoryHost`], kept in order.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateElement { id: HostNodeId, tag: Rc<str> },
    CreateText { id: HostNodeId, content: Rc<str> },
    AppendChild { parent: HostNodeId, child: HostNodeId },
    InsertBefore {
        parent: HostNodeId,
        child: HostNodeId,
        before: HostNodeId,
    },
    RemoveChild { parent: HostNodeId, child: HostNodeId },
    CommitUpdate { node: HostNodeId, update: HostUpdate },
}

impl HostOp {
    /// Whether the op changed an attached tree rather than building a
    /// detached node.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }
}

#[derive(Clone, Debug)]
pub enum MemoryNodeKind {
    Container,
    Element {
        tag: Rc<str>,
        attributes: IndexMap<Rc<str>, PropValue>,
    },
    Text(Rc<str>),
}

#[derive(Clone, Debug)]
pub struct MemoryNode {
    pub kind: MemoryNodeKind,
    pub parent: Option<HostNodeId>,
    pub children: Vec<HostNodeId>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// In-memory host surface with an operation log.
#[derive(Debug)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<HostOp>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Id of the container node every `MemoryHost` starts with.
    pub const CONTAINER: HostNodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Some(MemoryNode::new(MemoryNodeKind::Container))],
            ops: Vec::new(),
        }
    }

    pub fn node(&self, id: HostNodeId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn children(&self, id: HostNodeId) -> &[HostNodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    /// Number of nodes ever created, the container included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Concatenated text of every text node below `id`, in tree order.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    fn collect_text(&self, id: HostNodeId, output: &mut String) {
        if let Some(node) = self.node(id) {
            if let MemoryNodeKind::Text(content) = &node.kind {
                output.push_str(content);
            }
            for child in &node.children {
                self.collect_text(*child, output);
            }
        }
    }

    /// Renders the attached tree below `root` as markup-like text.
    pub fn dump_tree(&self, root: HostNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.node(id) else {
            output.push_str(&format!("{}[{}] (missing)\n", indent, id));
            return;
        };
        match &node.kind {
            MemoryNodeKind::Container => output.push_str(&format!("{}#container\n", indent)),
            MemoryNodeKind::Text(content) => {
                output.push_str(&format!("{}{:?}\n", indent, content))
            }
            MemoryNodeKind::Element { tag, attributes } => {
                output.push_str(&format!("{}<{}", indent, tag));
                for (name, value) in attributes {
                    output.push_str(&format!(" {}=\"{}\"", name, value));
                }
                output.push_str(">\n");
            }
        }
        for child in &node.children {
            self.dump_node(output, *child, depth + 1);
        }
    }

    fn insert(&mut self, kind: MemoryNodeKind) -> HostNodeId {
        self.nodes.push(Some(MemoryNode::new(kind)));
        self.nodes.len() - 1
    }

    fn node_mut(&mut self, id: HostNodeId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn detach(&mut self, child: HostNodeId) {
        let parent = self.node(child).and_then(|node| node.parent);
        if let Some(parent) = parent {
            if let Some(parent) = self.node_mut(parent) {
                parent.children.retain(|id| *id != child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    fn drop_subtree(&mut self, id: HostNodeId) {
        let children = self
            .node_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            self.drop_subtree(child);
        }
        if let Some(slot) = self.nodes.get_mut(id) {
            slot.take();
        }
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostNodeId {
        let tag: Rc<str> = Rc::from(tag);
        let attributes = props
            .attributes()
            .filter(|(_, value)| !matches!(value, PropValue::Callback(_)))
            .map(|(name, value)| (Rc::from(name), value.clone()))
            .collect();
        let id = self.insert(MemoryNodeKind::Element {
            tag: tag.clone(),
            attributes,
        });
        self.ops.push(HostOp::CreateElement { id, tag });
        id
    }

    fn create_text(&mut self, content: &str) -> HostNodeId {
        let content: Rc<str> = Rc::from(content);
        let id = self.insert(MemoryNodeKind::Text(content.clone()));
        self.ops.push(HostOp::CreateText { id, content });
        id
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        self.ops.push(HostOp::AppendChild { parent, child });
        if self.node(parent).is_none() || self.node(child).is_none() {
            log::warn!("append_child({parent}, {child}) on a missing node");
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
        if self.node(parent).is_none() || self.node(child).is_none() {
            log::warn!("insert_before({parent}, {child}, {before}) on a missing node");
            return;
        }
        self.detach(child);
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        match node.children.iter().position(|id| *id == before) {
            Some(position) => node.children.insert(position, child),
            None => {
                log::warn!("insert_before: {before} is not a child of {parent}, appending");
                node.children.push(child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        self.ops.push(HostOp::RemoveChild { parent, child });
        if self.node(child).and_then(|node| node.parent) != Some(parent) {
            log::warn!("remove_child: {child} is not a child of {parent}");
        }
        self.detach(child);
        self.drop_subtree(child);
    }

    fn commit_update(&mut self, node: HostNodeId, update: HostUpdate) {
        self.ops.push(HostOp::CommitUpdate {
            node,
            update: update.clone(),
        });
        let Some(target) = self.node_mut(node) else {
            log::warn!("commit_update on missing node {node}");
            return;
        };
        match (&mut target.kind, update) {
            (MemoryNodeKind::Text(content), HostUpdate::Text(next)) => *content = next,
            (MemoryNodeKind::Element { attributes, .. }, HostUpdate::Attributes { changes, .. }) => {
                for change in changes {
                    match change.value {
                        Some(PropValue::Callback(_)) => {}
                        Some(value) => {
                            attributes.insert(change.name, value);
                        }
                        None => {
                            attributes.shift_remove(&change.name);
                        }
                    }
                }
            }
            (kind, update) => {
                log::warn!("commit_update: {update:?} does not apply to {kind:?}");
            }
        }
    }
}

impl fmt::Display for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump_tree(Self::CONTAINER))
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
