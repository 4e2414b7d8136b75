//! In-memory host: a headless rendering surface for tests and inspection.
//!
//! Implements the full [`HostAdapter`] contract over a slab of nodes, keeps
//! an operation log (which is how "zero mutations on an idempotent
//! re-render" becomes assertable), and serializes the committed tree back
//! into an element-shaped snapshot.
//!
//! Contract violations — removing a child that is not attached, inserting
//! before a missing sibling, attaching one node under two parents — panic:
//! they mean the reconciler broke a tree invariant, which is never a
//! recoverable runtime condition.

use rustc_hash::FxHashMap;

use crate::host::{HostAdapter, HostHandle, HostParent};
use crate::types::Props;

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug)]
enum MemNodeKind {
    Element { tag: String, props: Props },
    Text(String),
}

#[derive(Debug)]
struct MemNode {
    kind: MemNodeKind,
    children: Vec<HostHandle>,
    /// Attached parent, if any. Used to reject duplicate attachment.
    parent: Option<HostParent>,
    hidden: bool,
}

/// Element-shaped serialization of a committed host tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotNode {
    Element {
        tag: String,
        props: Props,
        hidden: bool,
        children: Vec<SnapshotNode>,
    },
    Text(String),
}

impl SnapshotNode {
    /// Bare element without props, for compact assertions.
    pub fn el(tag: &str, children: Vec<SnapshotNode>) -> Self {
        SnapshotNode::Element {
            tag: tag.to_string(),
            props: Props::default(),
            hidden: false,
            children,
        }
    }

    pub fn text(content: &str) -> Self {
        SnapshotNode::Text(content.to_string())
    }
}

// =============================================================================
// MemoryHost
// =============================================================================

pub struct MemoryHost {
    nodes: FxHashMap<HostHandle, MemNode>,
    container: Vec<HostHandle>,
    next_handle: u32,
    ops: Vec<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            container: Vec::new(),
            next_handle: 0,
            ops: Vec::new(),
        }
    }

    /// Drain the operation log accumulated since the last call.
    pub fn take_ops(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ops)
    }

    /// Serialize the container's committed children.
    pub fn snapshot(&self) -> Vec<SnapshotNode> {
        self.container
            .iter()
            .map(|&handle| self.snapshot_node(handle))
            .collect()
    }

    /// All visible text in document order, concatenated.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for &handle in &self.container {
            self.collect_text(handle, &mut out);
        }
        out
    }

    fn snapshot_node(&self, handle: HostHandle) -> SnapshotNode {
        let node = &self.nodes[&handle];
        match &node.kind {
            MemNodeKind::Element { tag, props } => SnapshotNode::Element {
                tag: tag.clone(),
                props: props.clone(),
                hidden: node.hidden,
                children: node
                    .children
                    .iter()
                    .map(|&child| self.snapshot_node(child))
                    .collect(),
            },
            MemNodeKind::Text(content) => SnapshotNode::Text(content.clone()),
        }
    }

    fn collect_text(&self, handle: HostHandle, out: &mut String) {
        let node = &self.nodes[&handle];
        if node.hidden {
            return;
        }
        match &node.kind {
            MemNodeKind::Text(content) => out.push_str(content),
            MemNodeKind::Element { .. } => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    fn alloc(&mut self, kind: MemNodeKind) -> HostHandle {
        let handle = HostHandle(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            MemNode {
                kind,
                children: Vec::new(),
                parent: None,
                hidden: false,
            },
        );
        handle
    }

    fn children_mut(&mut self, parent: HostParent) -> &mut Vec<HostHandle> {
        match parent {
            HostParent::Container => &mut self.container,
            HostParent::Instance(handle) => {
                &mut self
                    .nodes
                    .get_mut(&handle)
                    .expect("unknown host parent")
                    .children
            }
        }
    }

    fn attach(&mut self, parent: HostParent, child: HostHandle) {
        let node = self.nodes.get_mut(&child).expect("unknown host child");
        if let Some(existing) = node.parent {
            assert!(
                existing == parent,
                "host node attached under two parents: {child:?}"
            );
        }
        node.parent = Some(parent);
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&mut self, tag: &str, props: &Props) -> HostHandle {
        let handle = self.alloc(MemNodeKind::Element {
            tag: tag.to_string(),
            props: props.clone(),
        });
        self.ops.push(format!("create <{tag}> {handle:?}"));
        handle
    }

    fn create_text(&mut self, content: &str) -> HostHandle {
        let handle = self.alloc(MemNodeKind::Text(content.to_string()));
        self.ops.push(format!("create text {handle:?}"));
        handle
    }

    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.attach(HostParent::Instance(parent), child);
        self.nodes
            .get_mut(&parent)
            .expect("unknown host parent")
            .children
            .push(child);
        // Off-tree construction is not logged as a mutation; the tree is
        // not visible yet.
    }

    fn append_child(&mut self, parent: HostParent, child: HostHandle) {
        self.attach(parent, child);
        let children = self.children_mut(parent);
        // A move within the same parent detaches first.
        children.retain(|&c| c != child);
        children.push(child);
        self.ops.push(format!("append {child:?}"));
    }

    fn insert_before(&mut self, parent: HostParent, child: HostHandle, before: HostHandle) {
        self.attach(parent, child);
        let children = self.children_mut(parent);
        children.retain(|&c| c != child);
        let index = children
            .iter()
            .position(|&c| c == before)
            .expect("insert_before: sibling not found");
        children.insert(index, child);
        self.ops.push(format!("insert {child:?} before {before:?}"));
    }

    fn remove_child(&mut self, parent: HostParent, child: HostHandle) {
        let children = self.children_mut(parent);
        let index = children
            .iter()
            .position(|&c| c == child)
            .expect("remove_child: child not found");
        children.remove(index);
        self.remove_recursive(child);
        self.ops.push(format!("remove {child:?}"));
    }

    fn commit_prop_update(&mut self, instance: HostHandle, next: &Props) {
        let node = self.nodes.get_mut(&instance).expect("unknown host instance");
        let MemNodeKind::Element { tag, props } = &mut node.kind else {
            panic!("prop update on a text node");
        };
        if *props != *next {
            *props = next.clone();
            let tag = tag.clone();
            self.ops.push(format!("update <{tag}> {instance:?}"));
        }
    }

    fn commit_text_update(&mut self, instance: HostHandle, content: &str) {
        let node = self.nodes.get_mut(&instance).expect("unknown host instance");
        let MemNodeKind::Text(text) = &mut node.kind else {
            panic!("text update on an element node");
        };
        if text != content {
            *text = content.to_string();
            self.ops.push(format!("text {instance:?} = {content:?}"));
        }
    }

    fn hide(&mut self, instance: HostHandle) {
        self.nodes
            .get_mut(&instance)
            .expect("unknown host instance")
            .hidden = true;
        self.ops.push(format!("hide {instance:?}"));
    }

    fn unhide(&mut self, instance: HostHandle) {
        self.nodes
            .get_mut(&instance)
            .expect("unknown host instance")
            .hidden = false;
        self.ops.push(format!("unhide {instance:?}"));
    }
}

impl MemoryHost {
    fn remove_recursive(&mut self, handle: HostHandle) {
        if let Some(node) = self.nodes.remove(&handle) {
            for child in node.children {
                self.remove_recursive(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    #[test]
    fn test_append_and_snapshot() {
        let mut host = MemoryHost::new();
        let div = host.create_element("div", &props! { "id" => "a" });
        let text = host.create_text("hi");
        host.append_initial_child(div, text);
        host.append_child(HostParent::Container, div);

        assert_eq!(host.text_content(), "hi");
        match &host.snapshot()[0] {
            SnapshotNode::Element { tag, children, .. } => {
                assert_eq!(tag, "div");
                assert_eq!(children[0], SnapshotNode::text("hi"));
            }
            other => panic!("unexpected snapshot {other:?}"),
        }
    }

    #[test]
    fn test_insert_before_moves_existing() {
        let mut host = MemoryHost::new();
        let a = host.create_element("a", &props! {});
        let b = host.create_element("b", &props! {});
        host.append_child(HostParent::Container, a);
        host.append_child(HostParent::Container, b);

        // Re-inserting an attached node relocates it.
        host.insert_before(HostParent::Container, b, a);
        let tags: Vec<_> = host
            .snapshot()
            .iter()
            .map(|n| match n {
                SnapshotNode::Element { tag, .. } => tag.clone(),
                SnapshotNode::Text(t) => t.clone(),
            })
            .collect();
        assert_eq!(tags, ["b", "a"]);
    }

    #[test]
    #[should_panic(expected = "child not found")]
    fn test_remove_missing_child_panics() {
        let mut host = MemoryHost::new();
        let a = host.create_element("a", &props! {});
        host.remove_child(HostParent::Container, a);
    }

    #[test]
    fn test_hide_excludes_text() {
        let mut host = MemoryHost::new();
        let a = host.create_element("a", &props! {});
        let t = host.create_text("x");
        host.append_initial_child(a, t);
        host.append_child(HostParent::Container, a);

        host.hide(a);
        assert_eq!(host.text_content(), "");
        host.unhide(a);
        assert_eq!(host.text_content(), "x");
    }
}
