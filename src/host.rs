//! Host adapter contract.
//!
//! The reconciler never touches a concrete display; it drives an adapter
//! that creates, attaches, and mutates primitive host nodes. One adapter
//! instance backs one root container. The crate ships an in-memory
//! implementation ([`crate::renderer::MemoryHost`]) for tests and headless
//! use; real surfaces implement this trait externally.
//!
//! Adapter operations are infallible by contract: a missing child on remove
//! or a missing sibling on insert means the reconciler violated a tree
//! invariant, and implementations should treat it as a logic error (the
//! in-memory host panics).

use crate::types::Props;

/// Opaque handle to a host-tree node, assigned by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u32);

/// Where a structural operation applies: the root container itself, or a
/// host element somewhere below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostParent {
    Container,
    Instance(HostHandle),
}

pub trait HostAdapter {
    /// Create a primitive element node. Not yet attached anywhere.
    fn create_element(&mut self, tag: &str, props: &Props) -> HostHandle;

    /// Create a text node. Not yet attached anywhere.
    fn create_text(&mut self, content: &str) -> HostHandle;

    /// Append a child to a parent that is still detached (initial, bottom-up
    /// construction during the completion phase).
    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle);

    /// Append a child as the last child of `parent`.
    fn append_child(&mut self, parent: HostParent, child: HostHandle);

    /// Insert `child` immediately before `before` under `parent`.
    fn insert_before(&mut self, parent: HostParent, child: HostHandle, before: HostHandle);

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: HostParent, child: HostHandle);

    /// Apply new props to an element. The adapter owns prop diffing.
    fn commit_prop_update(&mut self, instance: HostHandle, next: &Props);

    /// Replace the content of a text node.
    fn commit_text_update(&mut self, instance: HostHandle, content: &str);

    /// Visually hide a node without detaching it.
    fn hide(&mut self, instance: HostHandle);

    /// Undo [`HostAdapter::hide`].
    fn unhide(&mut self, instance: HostHandle);
}
