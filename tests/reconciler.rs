//! Tree reconciliation behavior against the in-memory host.
//!
//! Run with: cargo test --test reconciler

use std::cell::RefCell;
use std::rc::Rc;

use weft::{
    fragment, host, host_with_ref, props, text, ComponentDef, Element, MemoryHost, RefBinding,
    Root, SchedulerPriority, Setter, SnapshotNode, Value,
};

// =============================================================================
// Helpers
// =============================================================================

type SetterSlot<T> = Rc<RefCell<Option<Setter<T>>>>;

fn setter_slot<T>() -> SetterSlot<T> {
    Rc::new(RefCell::new(None))
}

/// A component rendering `<div>{state}</div>` and publishing its setter.
fn text_state_component(slot: SetterSlot<String>, initial: &'static str) -> ComponentDef {
    ComponentDef::new(move |ctx, _| {
        let (value, setter) = ctx.use_state(|| initial.to_string())?;
        *slot.borrow_mut() = Some(setter);
        Ok(host("div", props! {}, vec![text(value.as_str())]))
    })
}

fn tags(snapshot: &[SnapshotNode]) -> Vec<String> {
    snapshot
        .iter()
        .map(|node| match node {
            SnapshotNode::Element { tag, .. } => tag.clone(),
            SnapshotNode::Text(content) => format!("#{content}"),
        })
        .collect()
}

// =============================================================================
// Mounting
// =============================================================================

#[test]
fn test_mount_host_tree() {
    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "div",
        props! { "id" => "app" },
        vec![text("hello"), host("span", props! {}, vec![text("world")])],
    ));
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "helloworld");
    let snapshot = root.host().snapshot();
    assert_eq!(snapshot.len(), 1);
    match &snapshot[0] {
        SnapshotNode::Element { tag, props, children, .. } => {
            assert_eq!(tag, "div");
            assert_eq!(props.get("id"), Some(&Value::from("app")));
            assert_eq!(children.len(), 2);
        }
        other => panic!("unexpected snapshot {other:?}"),
    }
}

#[test]
fn test_mount_component() {
    let slot = setter_slot();
    let app = text_state_component(slot, "first");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "first");
}

#[test]
fn test_render_empty_unmounts() {
    let mut root = Root::new(MemoryHost::new());
    root.render(host("div", props! {}, vec![text("x")]));
    root.flush().unwrap();
    assert_eq!(root.host().snapshot().len(), 1);

    root.render(Element::Empty);
    root.flush().unwrap();
    assert!(root.host().snapshot().is_empty());
}

// =============================================================================
// Idempotent re-render
// =============================================================================

#[test]
fn test_identical_rerender_commits_nothing() {
    let build = || {
        host(
            "div",
            props! { "id" => "app" },
            vec![text("same"), host("span", props! {}, vec![])],
        )
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(build());
    root.flush().unwrap();
    root.host_mut().take_ops();

    root.render(build());
    root.flush().unwrap();

    let ops = root.host_mut().take_ops();
    assert!(ops.is_empty(), "second identical render mutated: {ops:?}");
}

// =============================================================================
// State updates
// =============================================================================

#[test]
fn test_set_state_updates_text() {
    let slot = setter_slot();
    let app = text_state_component(slot.clone(), "before");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();
    root.host_mut().take_ops();

    let setter = slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || setter.set("after".into()));
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "after");
    // Content changed in place; nothing was recreated.
    let ops = root.host_mut().take_ops();
    assert!(ops.iter().all(|op| !op.starts_with("create")), "{ops:?}");
}

#[test]
fn test_updates_compose_in_order() {
    let slot = setter_slot();
    let app = text_state_component(slot.clone(), "");

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();

    let setter = slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || {
        setter.update(|s| format!("{s}1"));
        setter.update(|s| format!("{s}2"));
        setter.update(|s| format!("{s}3"));
    });
    root.flush().unwrap();

    // One batched render applied all three in submission order.
    assert_eq!(root.host().text_content(), "123");
}

// =============================================================================
// Child diffing
// =============================================================================

#[test]
fn test_unkeyed_type_change_replaces() {
    let mut root = Root::new(MemoryHost::new());
    root.render(host("main", props! {}, vec![host("div", props! {}, vec![])]));
    root.flush().unwrap();
    root.host_mut().take_ops();

    root.render(host("main", props! {}, vec![host("span", props! {}, vec![])]));
    root.flush().unwrap();

    let ops = root.host_mut().take_ops();
    assert!(ops.iter().any(|op| op.starts_with("create <span>")), "{ops:?}");
    assert!(ops.iter().any(|op| op.starts_with("remove")), "{ops:?}");
    // A type change is never expressed as a prop update.
    assert!(ops.iter().all(|op| !op.starts_with("update")), "{ops:?}");
}

#[test]
fn test_keyed_reorder_preserves_instances() {
    let item = |key: &str, label: &str| {
        host("li", props! {}, vec![text(label)]).keyed(key)
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "ul",
        props! {},
        vec![item("1", "a"), item("2", "b"), item("3", "c")],
    ));
    root.flush().unwrap();
    root.host_mut().take_ops();

    root.render(host(
        "ul",
        props! {},
        vec![item("3", "c"), item("1", "a"), item("2", "b")],
    ));
    root.flush().unwrap();

    // Everything was moved or kept; nothing was recreated or removed.
    let ops = root.host_mut().take_ops();
    assert!(ops.iter().all(|op| !op.starts_with("create")), "{ops:?}");
    assert!(ops.iter().all(|op| !op.starts_with("remove")), "{ops:?}");

    match &root.host().snapshot()[0] {
        SnapshotNode::Element { children, .. } => {
            let labels: Vec<String> = children
                .iter()
                .map(|child| match child {
                    SnapshotNode::Element { children, .. } => match &children[0] {
                        SnapshotNode::Text(content) => content.clone(),
                        other => panic!("unexpected {other:?}"),
                    },
                    other => panic!("unexpected {other:?}"),
                })
                .collect();
            assert_eq!(labels, ["c", "a", "b"]);
        }
        other => panic!("unexpected snapshot {other:?}"),
    }
}

#[test]
fn test_keyed_state_follows_key() {
    let slots: Vec<SetterSlot<String>> = vec![setter_slot(), setter_slot()];
    let item = {
        let slots = slots.clone();
        ComponentDef::new(move |ctx, props| {
            let which = match props.get("slot") {
                Some(Value::Int(i)) => *i as usize,
                _ => 0,
            };
            let (value, setter) = ctx.use_state(String::new)?;
            *slots[which].borrow_mut() = Some(setter);
            Ok(host("li", props! {}, vec![text(value.as_str())]))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "ul",
        props! {},
        vec![
            item.el_keyed("x", props! { "slot" => 0 }),
            item.el_keyed("y", props! { "slot" => 1 }),
        ],
    ));
    root.flush().unwrap();

    let set_x = slots[0].borrow().clone().unwrap();
    let set_y = slots[1].borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || {
        set_x.set("X".into());
        set_y.set("Y".into());
    });
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "XY");

    // Swap order; each keyed unit keeps its own state.
    root.render(host(
        "ul",
        props! {},
        vec![
            item.el_keyed("y", props! { "slot" => 1 }),
            item.el_keyed("x", props! { "slot" => 0 }),
        ],
    ));
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "YX");
}

#[test]
fn test_keyed_removal_in_sequence() {
    let item = |key: &str| host("li", props! {}, vec![text(key)]).keyed(key);

    let mut root = Root::new(MemoryHost::new());
    root.render(host("ul", props! {}, vec![item("a"), item("b"), item("c")]));
    root.flush().unwrap();

    root.render(host("ul", props! {}, vec![item("a"), item("c")]));
    root.flush().unwrap();

    assert_eq!(root.host().text_content(), "ac");
}

#[test]
fn test_unkeyed_fragment_unwraps() {
    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "div",
        props! {},
        vec![fragment(vec![text("a"), text("b")])],
    ));
    root.flush().unwrap();
    assert_eq!(root.host().text_content(), "ab");

    match &root.host().snapshot()[0] {
        SnapshotNode::Element { children, .. } => assert_eq!(children.len(), 2),
        other => panic!("unexpected snapshot {other:?}"),
    }
}

#[test]
fn test_prop_update_in_place() {
    let mut root = Root::new(MemoryHost::new());
    root.render(host("div", props! { "class" => "a" }, vec![]));
    root.flush().unwrap();
    root.host_mut().take_ops();

    root.render(host("div", props! { "class" => "b" }, vec![]));
    root.flush().unwrap();

    let ops = root.host_mut().take_ops();
    assert_eq!(tags(&root.host().snapshot()), ["div"]);
    assert!(ops.iter().any(|op| op.starts_with("update <div>")), "{ops:?}");
    assert!(ops.iter().all(|op| !op.starts_with("create")), "{ops:?}");
}

// =============================================================================
// Refs
// =============================================================================

#[test]
fn test_ref_attach_and_detach() {
    let binding = RefBinding::new();

    let mut root = Root::new(MemoryHost::new());
    root.render(host(
        "div",
        props! {},
        vec![host_with_ref("input", props! {}, vec![], binding.clone())],
    ));
    root.flush().unwrap();
    assert!(binding.get().is_some());

    // Dropping the element detaches the binding.
    root.render(host("div", props! {}, vec![]));
    root.flush().unwrap();
    assert!(binding.get().is_none());
}

// =============================================================================
// Hook usage errors
// =============================================================================

#[test]
fn test_conditional_hook_is_fatal() {
    let slot = setter_slot::<bool>();
    let app = {
        let slot = slot.clone();
        ComponentDef::new(move |ctx, _| {
            let (skip, setter) = ctx.use_state(|| false)?;
            *slot.borrow_mut() = Some(setter);
            if !*skip {
                let (extra, _) = ctx.use_state(|| 0i64)?;
                let _ = extra;
            }
            Ok(host("div", props! {}, vec![]))
        })
    };

    let mut root = Root::new(MemoryHost::new());
    root.render(app.el(props! {}));
    root.flush().unwrap();

    let setter = slot.borrow().clone().unwrap();
    root.run_with_priority(SchedulerPriority::Immediate, || setter.set(true));
    let err = root.flush().unwrap_err();
    assert!(
        matches!(err, weft::ReconcileError::HookCountMismatch { expected: 2, found: 1 }),
        "{err}"
    );
}
