use super::*;
use crate::element::{element, Element};

fn props_of(element: Element) -> Props {
    match element {
        Element::Node(node) => node.props.clone(),
        _ => Props::default(),
    }
}

#[test]
fn builds_and_dumps_a_tree() {
    let mut host = MemoryHost::new();
    let props = props_of(element("div").prop("id", "main").on("click", || {}).build());
    let div = host.create_element("div", &props);
    let hello = host.create_text("hello");
    host.append_child(div, hello);
    host.append_child(MemoryHost::CONTAINER, div);

    assert_eq!(host.children(MemoryHost::CONTAINER), &[div]);
    assert_eq!(host.text_content(MemoryHost::CONTAINER), "hello");
    assert_eq!(
        host.dump_tree(MemoryHost::CONTAINER),
        "#container\n  <div id=\"main\">\n    \"hello\"\n"
    );
    assert_eq!(host.to_string(), host.dump_tree(MemoryHost::CONTAINER));
}

#[test]
fn insert_before_moves_an_attached_node() {
    let mut host = MemoryHost::new();
    let a = host.create_text("a");
    let b = host.create_text("b");
    let c = host.create_text("c");
    for node in [a, b, c] {
        host.append_child(MemoryHost::CONTAINER, node);
    }

    host.insert_before(MemoryHost::CONTAINER, c, a);
    assert_eq!(host.children(MemoryHost::CONTAINER), &[c, a, b]);
    assert_eq!(host.node(c).unwrap().parent, Some(MemoryHost::CONTAINER));
}

#[test]
fn remove_child_drops_the_subtree() {
    let mut host = MemoryHost::new();
    let list = host.create_element("ul", &Props::default());
    let item = host.create_element("li", &Props::default());
    let label = host.create_text("x");
    host.append_child(item, label);
    host.append_child(list, item);
    host.append_child(MemoryHost::CONTAINER, list);

    host.remove_child(list, item);
    assert!(host.children(list).is_empty());
    assert!(host.node(item).is_none());
    assert!(host.node(label).is_none());
    assert_eq!(host.len(), 2);
}

#[test]
fn commit_update_applies_text_and_attributes() {
    let mut host = MemoryHost::new();
    let props = props_of(element("input").prop("value", "a").prop("disabled", true).build());
    let input = host.create_element("input", &props);
    let label = host.create_text("old");
    host.take_ops();

    host.commit_update(label, HostUpdate::Text("new".into()));
    host.commit_update(
        input,
        HostUpdate::Attributes {
            tag: "input".into(),
            changes: vec![
                PropChange {
                    name: "disabled".into(),
                    value: None,
                },
                PropChange {
                    name: "value".into(),
                    value: Some(PropValue::from("b")),
                },
            ],
        },
    );

    assert_eq!(host.text_content(label), "new");
    match &host.node(input).unwrap().kind {
        MemoryNodeKind::Element { attributes, .. } => {
            assert_eq!(attributes.len(), 1);
            assert_eq!(attributes.get("value"), Some(&PropValue::from("b")));
        }
        other => panic!("unexpected node {other:?}"),
    }
    let ops = host.take_ops();
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().all(HostOp::is_mutation));
}

#[test]
fn creating_nodes_is_not_a_mutation() {
    let mut host = MemoryHost::new();
    let node = host.create_text("detached");
    assert_eq!(
        host.ops(),
        &[HostOp::CreateText {
            id: node,
            content: "detached".into()
        }]
    );
    assert!(!host.ops()[0].is_mutation());
}
