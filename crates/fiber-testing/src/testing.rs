use std::sync::Arc;

use fiber_core::{
    CommitReport, DefaultScheduler, Element, FiberRoot, Host, HostNodeId, HostOp, HostUpdate,
    MemoryHost, Props, ReconcileError, Runtime, RuntimeScheduler,
};

/// Host wrapper that logs every call before forwarding it.
///
/// Works with any [`Host`], so adapters without their own operation log
/// can still be asserted on. Ids in the log are the ones the wrapped host
/// handed out.
#[derive(Debug, Default)]
pub struct RecordingHost<H = MemoryHost> {
    inner: H,
    ops: Vec<HostOp>,
}

impl<H: Host> RecordingHost<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            ops: Vec::new(),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Drains the log and keeps only the calls that touched an attached
    /// tree.
    pub fn take_mutations(&mut self) -> Vec<HostOp> {
        self.take_ops()
            .into_iter()
            .filter(HostOp::is_mutation)
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_mutation()).count()
    }
}

impl<H: Host> Host for RecordingHost<H> {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostNodeId {
        let id = self.inner.create_element(tag, props);
        self.ops.push(HostOp::CreateElement {
            id,
            tag: tag.into(),
        });
        id
    }

    fn create_text(&mut self, content: &str) -> HostNodeId {
        let id = self.inner.create_text(content);
        self.ops.push(HostOp::CreateText {
            id,
            content: content.into(),
        });
        id
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        self.inner.append_child(parent, child);
        self.ops.push(HostOp::AppendChild { parent, child });
    }

    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        self.inner.insert_before(parent, child, before);
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        self.inner.remove_child(parent, child);
        self.ops.push(HostOp::RemoveChild { parent, child });
    }

    fn commit_update(&mut self, node: HostNodeId, update: HostUpdate) {
        self.ops.push(HostOp::CommitUpdate {
            node,
            update: update.clone(),
        });
        self.inner.commit_update(node, update);
    }
}

/// Headless harness for exercising a root in tests.
///
/// `ReconcilerTestRule` owns an in-memory host wrapped in a
/// [`RecordingHost`] and exposes helpers for installing content, pumping
/// the runtime and asserting on the host tree without a real surface.
pub struct ReconcilerTestRule {
    root: FiberRoot<RecordingHost<MemoryHost>>,
    content: Option<Element>,
}

impl ReconcilerTestRule {
    /// Create a new test rule backed by the default scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(DefaultScheduler))
    }

    /// Create a rule whose runtime notifies `scheduler`, e.g. to count
    /// requested turns.
    pub fn with_scheduler(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        let root = FiberRoot::with_runtime(
            MemoryHost::CONTAINER,
            RecordingHost::new(MemoryHost::new()),
            Runtime::new(scheduler),
        );
        Self {
            root,
            content: None,
        }
    }

    /// Install `content` as the root element, render it and settle every
    /// follow-up render and effect.
    pub fn set_content(&mut self, content: impl Into<Element>) -> Result<(), ReconcileError> {
        let content = content.into();
        self.content = Some(content.clone());
        self.root.render_sync(content)?;
        self.pump_until_idle()
    }

    /// Render the installed content again.
    pub fn rerender(&mut self) -> Result<(), ReconcileError> {
        if let Some(content) = self.content.clone() {
            self.root.render_sync(content)?;
        }
        self.pump_until_idle()
    }

    /// Drive the runtime until neither queue holds work.
    pub fn pump_until_idle(&mut self) -> Result<(), ReconcileError> {
        self.root.runtime().run_until_idle()
    }

    /// Returns whether content has been installed in this rule.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn root(&self) -> &FiberRoot<RecordingHost<MemoryHost>> {
        &self.root
    }

    pub fn runtime(&self) -> &Runtime {
        self.root.runtime()
    }

    pub fn last_commit(&self) -> Option<CommitReport> {
        self.root.last_commit()
    }

    /// Host calls that changed the attached tree since the last call.
    pub fn take_mutations(&mut self) -> Vec<HostOp> {
        self.root.with_host_mut(RecordingHost::take_mutations)
    }

    /// Read access to the in-memory host for assertions about the tree.
    pub fn with_host<R>(&self, f: impl FnOnce(&MemoryHost) -> R) -> R {
        self.root.with_host(|host| f(host.inner()))
    }

    /// Indented dump of the host tree below the container.
    pub fn dump(&self) -> String {
        self.with_host(|host| host.dump_tree(MemoryHost::CONTAINER))
    }

    pub fn text_content(&self) -> String {
        self.with_host(|host| host.text_content(MemoryHost::CONTAINER))
    }
}

impl Default for ReconcilerTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `ReconcilerTestRule`.
pub fn run_test_reconciler<R>(f: impl FnOnce(&mut ReconcilerTestRule) -> R) -> R {
    let mut rule = ReconcilerTestRule::new();
    f(&mut rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiber_core::{element, CommitEffectKind};

    #[test]
    fn test_rule_reports_content_and_mutations() {
        run_test_reconciler(|rule| {
            assert!(!rule.has_content());
            assert_eq!(rule.text_content(), "");

            rule.set_content(element("div").child("hello"))
                .expect("install content");
            assert!(rule.has_content());
            assert_eq!(rule.text_content(), "hello");

            let mutations = rule.take_mutations();
            assert!(
                matches!(
                    mutations.last(),
                    Some(HostOp::AppendChild {
                        parent: MemoryHost::CONTAINER,
                        ..
                    })
                ),
                "commit attaches the new subtree last: {mutations:?}"
            );

            rule.rerender().expect("rerender");
            assert!(rule.take_mutations().is_empty());
            let report = rule.last_commit().expect("second commit recorded");
            assert_eq!(report.mutation_count(), 0);

            rule.set_content(element("div").child("bye"))
                .expect("replace content");
            assert_eq!(rule.text_content(), "bye");
            let report = rule.last_commit().expect("third commit recorded");
            assert_eq!(report.count(CommitEffectKind::Update), 1);
        });
    }

    #[test]
    fn recording_host_forwards_every_call() {
        let mut host = RecordingHost::new(MemoryHost::new());
        let div = host.create_element("div", &Props::default());
        let text = host.create_text("x");
        host.append_child(div, text);
        host.append_child(MemoryHost::CONTAINER, div);
        host.commit_update(text, HostUpdate::Text("y".into()));

        assert_eq!(host.ops().len(), 5);
        assert_eq!(host.mutation_count(), 3);
        assert_eq!(host.inner().text_content(MemoryHost::CONTAINER), "y");
        assert_eq!(host.take_mutations().len(), 3);
        assert!(host.ops().is_empty());
    }
}
