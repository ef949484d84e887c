use std::cell::RefCell;

use fiber_core::{
    component, element, use_effect, use_state, CommitEffectKind, Deps, EffectCleanup, Element,
    HookError, HostOp, HostUpdate, MemoryHost, Props, ReconcileError, RenderResult,
};
use fiber_macros::function_component;
use fiber_testing::prelude::*;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

fn keyed(keys: &[&str]) -> Element {
    element("ul")
        .children(
            keys.iter()
                .map(|key| element("li").key(*key).child(key.to_string()).build()),
        )
        .build()
}

#[test]
fn identical_trees_commit_nothing_the_second_time() {
    run_test_reconciler(|rule| {
        let tree = || {
            element("section")
                .prop("id", "main")
                .child(element("h1").child("title"))
                .child(keyed(&["a", "b", "c"]))
                .build()
        };
        rule.set_content(tree()).unwrap();
        rule.take_mutations();

        rule.set_content(tree()).unwrap();
        assert_eq!(rule.last_commit().unwrap().mutation_count(), 0);
        assert!(rule.take_mutations().is_empty());

        rule.set_content(tree()).unwrap();
        assert_eq!(rule.last_commit().unwrap().mutation_count(), 0);
        assert!(rule.take_mutations().is_empty());
    });
}

#[test]
fn swapped_keyed_children_are_reused_and_one_is_moved() {
    run_test_reconciler(|rule| {
        rule.set_content(keyed(&["1", "2"])).unwrap();
        rule.root().with_host_mut(|host| host.take_ops());

        rule.set_content(keyed(&["2", "1"])).unwrap();
        let report = rule.last_commit().unwrap();
        assert_eq!(report.count(CommitEffectKind::Placement), 1);
        assert_eq!(report.count(CommitEffectKind::Deletion), 0);

        let ops = rule.root().with_host_mut(|host| host.take_ops());
        assert!(
            ops.iter().all(HostOp::is_mutation),
            "no node is created for a reused fiber: {ops:?}"
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(rule.text_content(), "21");
    });
}

#[test]
fn removing_every_child_deletes_all_of_them() {
    run_test_reconciler(|rule| {
        rule.set_content(keyed(&["a", "b", "c"])).unwrap();
        let list = rule.with_host(|host| host.children(MemoryHost::CONTAINER)[0]);
        rule.take_mutations();

        rule.set_content(keyed(&[])).unwrap();
        let report = rule.last_commit().unwrap();
        assert_eq!(report.count(CommitEffectKind::Deletion), 3);
        assert_eq!(report.count(CommitEffectKind::Placement), 0);

        let removed = rule
            .take_mutations()
            .into_iter()
            .filter(|op| matches!(op, HostOp::RemoveChild { parent, .. } if *parent == list))
            .count();
        assert_eq!(removed, 3);
        assert!(rule.with_host(|host| host.children(list).is_empty()));
        rule.root().with_current(|arena, root| {
            let list_fiber = arena.children(root).unwrap()[0];
            assert!(arena.children(list_fiber).unwrap().is_empty());
        });
    });
}

#[test]
fn changed_text_is_updated_not_replaced() {
    run_test_reconciler(|rule| {
        rule.set_content(element("b").child("1")).unwrap();
        rule.set_content(element("b").child("2")).unwrap();

        let report = rule.last_commit().unwrap();
        let updates: Vec<_> = report.of_kind(CommitEffectKind::Update).collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].label, "#text \"2\"");
        assert_eq!(report.count(CommitEffectKind::Placement), 0);
    });
}

#[function_component]
fn Toggle(props: &Props) -> RenderResult {
    let (on, _) = use_state(|| true)?;
    if props.get_bool("second") == Some(true) {
        use_state(|| 0)?;
    }
    Ok(element("span").child(on.to_string()).build())
}

#[test]
fn dropping_a_hook_between_renders_is_fatal() {
    run_test_reconciler(|rule| {
        rule.set_content(component(Toggle).prop("second", true))
            .unwrap();
        let before = rule.dump();

        let error = rule
            .set_content(component(Toggle).prop("second", false))
            .unwrap_err();
        assert_eq!(
            error,
            ReconcileError::Component {
                name: "Toggle",
                source: HookError::FewerHooksThanPreviousRender {
                    expected: 2,
                    rendered: 1,
                },
            }
        );
        assert_eq!(rule.dump(), before);
    });
}

#[function_component]
fn Mounted(_props: &Props) -> RenderResult {
    use_effect(Deps::once(), || {
        LOG.with(|log| log.borrow_mut().push("create".into()));
        EffectCleanup::new(|| LOG.with(|log| log.borrow_mut().push("destroy".into())))
    })?;
    Ok(Element::Empty)
}

#[test]
fn unmounting_runs_the_destructor_exactly_once() {
    run_test_reconciler(|rule| {
        rule.set_content(element("div").child(component(Mounted)))
            .unwrap();
        assert_eq!(take_log(), vec!["create"]);

        rule.set_content(element("div")).unwrap();
        assert_eq!(take_log(), vec!["destroy"]);

        rule.rerender().unwrap();
        assert!(take_log().is_empty());
    });
}

#[test]
fn nested_text_change_is_a_single_host_mutation() {
    run_test_reconciler(|rule| {
        let tree = |value: &str| {
            element("div")
                .child(element("span").child(value.to_string()))
                .build()
        };
        rule.set_content(tree("1")).unwrap();
        let text_node = rule.with_host(|host| {
            let div = host.children(MemoryHost::CONTAINER)[0];
            let span = host.children(div)[0];
            host.children(span)[0]
        });
        rule.take_mutations();

        rule.set_content(tree("2")).unwrap();
        let report = rule.last_commit().unwrap();
        assert_eq!(report.count(CommitEffectKind::Update), 1);
        assert_eq!(report.count(CommitEffectKind::Placement), 0);
        assert_eq!(report.count(CommitEffectKind::Deletion), 0);
        assert_eq!(
            rule.take_mutations(),
            vec![HostOp::CommitUpdate {
                node: text_node,
                update: HostUpdate::Text("2".into()),
            }]
        );
    });
}
