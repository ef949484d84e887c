use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fiber_core::collections::map::HashMap;
use fiber_core::{
    component, element, use_effect, use_reducer, use_state, Callback, Deps, EffectCleanup,
    Element, FiberRoot, Host, HostNodeId, HostUpdate, MemoryHost, MemoryNodeKind, PropValue,
    Props, RenderResult,
};
use fiber_macros::function_component;
use fiber_runtime_std::StdRuntime;

/// Host that keeps the tree in memory, prints every mutation and remembers
/// event handlers so the script below can "click".
struct ConsoleHost {
    tree: MemoryHost,
    handlers: HashMap<(HostNodeId, String), Callback>,
}

impl ConsoleHost {
    fn new() -> Self {
        Self {
            tree: MemoryHost::new(),
            handlers: HashMap::new(),
        }
    }

    fn find_by_id(&self, node: HostNodeId, id: &str) -> Option<HostNodeId> {
        if let Some(MemoryNodeKind::Element { attributes, .. }) =
            self.tree.node(node).map(|node| &node.kind)
        {
            if attributes.get("id").and_then(PropValue::as_str) == Some(id) {
                return Some(node);
            }
        }
        self.tree
            .children(node)
            .iter()
            .find_map(|child| self.find_by_id(*child, id))
    }

    fn handler(&self, id: &str, event: &str) -> Option<Callback> {
        let node = self.find_by_id(MemoryHost::CONTAINER, id)?;
        self.handlers.get(&(node, event.to_string())).cloned()
    }
}

impl Host for ConsoleHost {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostNodeId {
        let id = self.tree.create_element(tag, props);
        for (name, value) in props.attributes() {
            if let Some(callback) = value.as_callback() {
                self.handlers.insert((id, name.to_string()), callback.clone());
            }
        }
        id
    }

    fn create_text(&mut self, content: &str) -> HostNodeId {
        self.tree.create_text(content)
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        log::info!("append {child} to {parent}");
        self.tree.append_child(parent, child);
    }

    fn insert_before(&mut self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        log::info!("insert {child} into {parent} before {before}");
        self.tree.insert_before(parent, child, before);
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        log::info!("remove {child} from {parent}");
        self.handlers.retain(|(node, _), _| *node != child);
        self.tree.remove_child(parent, child);
    }

    fn commit_update(&mut self, node: HostNodeId, update: HostUpdate) {
        match &update {
            HostUpdate::Text(content) => log::info!("set text of {node} to {content:?}"),
            HostUpdate::Attributes { tag, changes } => {
                for change in changes {
                    let key = (node, change.name.to_string());
                    match change.value.as_ref().and_then(PropValue::as_callback) {
                        Some(callback) => {
                            self.handlers.insert(key, callback.clone());
                        }
                        None => {
                            self.handlers.remove(&key);
                        }
                    }
                }
                log::info!("update {} attribute(s) of <{tag}> {node}", changes.len());
            }
        }
        self.tree.commit_update(node, update);
    }
}

#[function_component]
fn Counter(props: &Props) -> RenderResult {
    let step = props.get_int("step").unwrap_or(1);
    let (count, set_count) = use_state(|| 0i64)?;
    use_effect(Deps::keys(&count), move || {
        log::info!("count is now {count}");
        EffectCleanup::none()
    })?;

    Ok(element("div")
        .prop("class", "counter")
        .child(
            element("button")
                .prop("id", "increment")
                .on("onClick", move || set_count.update(move |count| count + step))
                .child("+"),
        )
        .child(element("span").child(count.to_string()))
        .build())
}

#[derive(Clone, Copy)]
enum TodoAction {
    Add,
    Reverse,
    DropFirst,
}

#[function_component]
fn TodoList(_props: &Props) -> RenderResult {
    let (todos, dispatch) = use_reducer(
        |todos: &Vec<u32>, action: TodoAction| {
            let mut todos = todos.clone();
            match action {
                TodoAction::Add => todos.push(todos.iter().max().map_or(1, |last| last + 1)),
                TodoAction::Reverse => todos.reverse(),
                TodoAction::DropFirst => {
                    if !todos.is_empty() {
                        todos.remove(0);
                    }
                }
            }
            todos
        },
        || vec![1, 2, 3],
    )?;

    let button = |id: &str, action: TodoAction| {
        let dispatch = dispatch.clone();
        element("button")
            .prop("id", id)
            .on("onClick", move || dispatch.dispatch(action))
            .child(id.to_string())
    };

    Ok(element("section")
        .child(button("add", TodoAction::Add))
        .child(button("reverse", TodoAction::Reverse))
        .child(button("drop", TodoAction::DropFirst))
        .child(element("ul").children(todos.iter().map(|todo| {
            element("li")
                .key(todo)
                .child(format!("todo #{todo}"))
                .build()
        })))
        .build())
}

fn app() -> Element {
    element("main")
        .child(component(Counter).prop("step", 2))
        .child(component(TodoList))
        .build()
}

fn main() {
    env_logger::init();

    println!("=== Fiber-RS Counter Example ===");

    let runtime = StdRuntime::new();
    let wake_requested = Arc::new(AtomicBool::new(false));
    runtime.set_waker({
        let wake_requested = Arc::clone(&wake_requested);
        move || wake_requested.store(true, Ordering::SeqCst)
    });

    let root = FiberRoot::with_runtime(MemoryHost::CONTAINER, ConsoleHost::new(), runtime.runtime());
    root.render(app());

    let script = [
        "increment",
        "increment",
        "add",
        "reverse",
        "drop",
        "increment",
    ];
    let mut clicks = script.iter();
    loop {
        while wake_requested.swap(false, Ordering::SeqCst) {
            if let Err(err) = runtime.pump() {
                log::error!("render failed: {err}");
                return;
            }
        }
        print!(
            "{}",
            root.with_host(|host| host.tree.dump_tree(MemoryHost::CONTAINER))
        );

        let Some(target) = clicks.next() else {
            break;
        };
        println!("-- click #{target}");
        match root.with_host(|host| host.handler(target, "onClick")) {
            Some(handler) => handler.call(),
            None => log::warn!("nothing to click at #{target}"),
        }
    }

    if let Err(err) = runtime.run_until_idle() {
        log::error!("runtime did not settle: {err}");
    }
    println!("{}", root.dump_fibers());
}
