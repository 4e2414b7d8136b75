//! Unit (fiber) node model.
//!
//! One [`Unit`] exists per component or host-element instance, linked into
//! a tree through arena indices. Each logical instance owns up to two
//! paired slots — the committed ("current") generation and the one under
//! construction — cross-linked through `alternate`. Exactly one of the pair
//! is visible at any time; the other is being built or waits as a spare
//! buffer for the next pass.

use std::any::Any;
use std::rc::Rc;

use crate::element::{ComponentDef, ContextId, Element, ElementKind, ElementNode, RefBinding};
use crate::engine::arena::{Arena, UnitId};
use crate::engine::flags::EffectFlags;
use crate::engine::lanes::Lanes;
use crate::engine::update_queue::{SharedQueue, StateValue, Update};
use crate::hooks::Hook;
use crate::host::HostHandle;
use crate::scheduler::TaskToken;
use crate::types::{Key, Props};

// =============================================================================
// Kinds and per-kind payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    FunctionComponent,
    HostRoot,
    HostComponent,
    HostText,
    Fragment,
    ContextProvider,
    Suspense,
    Offscreen,
}

/// Visibility mode of an offscreen subtree (the primary children of a
/// suspense boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenMode {
    Visible,
    Hidden,
}

/// The component function or host tag this unit instantiates, used for
/// reuse decisions across generations.
#[derive(Clone)]
pub enum ElementType {
    Host(Rc<str>),
    Component(ComponentDef),
    Provider(ContextId),
}

impl ElementType {
    pub fn matches(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Component(a), ElementType::Component(b)) => ComponentDef::same(a, b),
            (ElementType::Provider(a), ElementType::Provider(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::Host(tag) => write!(f, "Host({tag})"),
            ElementType::Component(def) => write!(f, "{def:?}"),
            ElementType::Provider(id) => write!(f, "Provider({id:?})"),
        }
    }
}

/// Props proposed for a unit, shaped per kind.
#[derive(Clone)]
pub enum UnitProps {
    /// HostRoot carries no props; its input arrives through the update
    /// queue.
    None,
    Host {
        attrs: Props,
        children: Vec<Element>,
    },
    Component(Props),
    Text(Rc<str>),
    /// Fragment children.
    Elements(Vec<Element>),
    Offscreen {
        mode: OffscreenMode,
        children: Vec<Element>,
    },
    Suspense {
        children: Vec<Element>,
        fallback: Vec<Element>,
    },
    Provider {
        value: Rc<dyn Any>,
        children: Vec<Element>,
    },
}

impl std::fmt::Debug for UnitProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitProps::None => f.write_str("None"),
            UnitProps::Host { attrs, children } => {
                write!(f, "Host({} attrs, {} children)", attrs.len(), children.len())
            }
            UnitProps::Component(props) => write!(f, "Component({} props)", props.len()),
            UnitProps::Text(content) => write!(f, "Text({content:?})"),
            UnitProps::Elements(children) => write!(f, "Elements({})", children.len()),
            UnitProps::Offscreen { mode, children } => {
                write!(f, "Offscreen({mode:?}, {} children)", children.len())
            }
            UnitProps::Suspense { .. } => f.write_str("Suspense"),
            UnitProps::Provider { children, .. } => {
                write!(f, "Provider({} children)", children.len())
            }
        }
    }
}

// =============================================================================
// Unit
// =============================================================================

pub struct Unit {
    pub kind: UnitKind,
    pub key: Option<Key>,
    pub element_type: Option<ElementType>,

    /// Props proposed for this render.
    pub pending_props: UnitProps,
    /// Props from the last pass that finished rendering this unit.
    pub committed_props: Option<UnitProps>,

    /// Hook records, positional; only function units have any.
    pub hooks: Vec<Hook>,

    /// Top-level element updates; HostRoot only. Shared between the two
    /// generations so no enqueue is lost across a swap.
    pub update_queue: Option<SharedQueue>,
    /// Replay state for skipped root updates (HostRoot only).
    pub base_state: Option<StateValue>,
    pub base_updates: Vec<Update>,
    /// The element the root most recently rendered (HostRoot only).
    pub memoized_element: Option<Element>,

    /// Host-tree node, once created.
    pub host_instance: Option<HostHandle>,
    pub ref_binding: Option<RefBinding>,

    pub flags: EffectFlags,
    pub subtree_flags: EffectFlags,
    /// Children slated for removal at the next commit.
    pub deletions: Vec<UnitId>,
    /// Lanes with unprocessed work on this unit.
    pub lanes: Lanes,

    // Tree links.
    pub parent: Option<UnitId>,
    pub child: Option<UnitId>,
    pub sibling: Option<UnitId>,
    /// Position within the sibling run, for keyless matching and move
    /// detection.
    pub index: u32,
    /// The paired unit from the other generation.
    pub alternate: Option<UnitId>,
}

impl Unit {
    pub fn new(kind: UnitKind, pending_props: UnitProps, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            element_type: None,
            pending_props,
            committed_props: None,
            hooks: Vec::new(),
            update_queue: None,
            base_state: None,
            base_updates: Vec::new(),
            memoized_element: None,
            host_instance: None,
            ref_binding: None,
            flags: EffectFlags::empty(),
            subtree_flags: EffectFlags::empty(),
            deletions: Vec::new(),
            lanes: Lanes::empty(),
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            alternate: None,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, UnitKind::HostComponent | UnitKind::HostText)
    }
}

// =============================================================================
// Construction from elements
// =============================================================================

/// Build a fresh unit for a node element (no previous generation).
pub fn unit_from_element(node: &ElementNode) -> Unit {
    let kind = match &node.kind {
        ElementKind::Host { .. } => UnitKind::HostComponent,
        ElementKind::Component { .. } => UnitKind::FunctionComponent,
        ElementKind::Fragment { .. } => UnitKind::Fragment,
        ElementKind::Provider { .. } => UnitKind::ContextProvider,
        ElementKind::Suspense { .. } => UnitKind::Suspense,
    };
    let mut unit = Unit::new(kind, unit_props_from_element(node), node.key.clone());
    unit.element_type = element_type_of(node);
    if let ElementKind::Host { ref_binding, .. } = &node.kind {
        unit.ref_binding = ref_binding.clone();
    }
    unit
}

pub fn unit_from_text(content: Rc<str>) -> Unit {
    Unit::new(UnitKind::HostText, UnitProps::Text(content), None)
}

pub fn unit_from_fragment(children: Vec<Element>, key: Option<Key>) -> Unit {
    Unit::new(UnitKind::Fragment, UnitProps::Elements(children), key)
}

pub fn unit_from_offscreen(mode: OffscreenMode, children: Vec<Element>) -> Unit {
    Unit::new(UnitKind::Offscreen, UnitProps::Offscreen { mode, children }, None)
}

/// The [`UnitProps`] a node element proposes, independent of whether the
/// unit is fresh or reused.
pub fn unit_props_from_element(node: &ElementNode) -> UnitProps {
    match &node.kind {
        ElementKind::Host { props, children, .. } => UnitProps::Host {
            attrs: props.clone(),
            children: children.clone(),
        },
        ElementKind::Component { props, .. } => UnitProps::Component(props.clone()),
        ElementKind::Fragment { children } => UnitProps::Elements(children.clone()),
        ElementKind::Provider { value, children, .. } => UnitProps::Provider {
            value: value.clone(),
            children: children.clone(),
        },
        ElementKind::Suspense { children, fallback } => UnitProps::Suspense {
            children: children.clone(),
            fallback: fallback.clone(),
        },
    }
}

/// The element type an element description would instantiate, for reuse
/// checks against an existing unit.
pub fn element_type_of(node: &ElementNode) -> Option<ElementType> {
    match &node.kind {
        ElementKind::Host { tag, .. } => Some(ElementType::Host(tag.clone())),
        ElementKind::Component { def, .. } => Some(ElementType::Component(def.clone())),
        ElementKind::Provider { context, .. } => Some(ElementType::Provider(*context)),
        ElementKind::Fragment { .. } | ElementKind::Suspense { .. } => None,
    }
}

// =============================================================================
// Generation pairing
// =============================================================================

/// Get or create the work-in-progress pair of `current`, primed with
/// `pending_props`.
///
/// First pass for an instance allocates the paired slot and cross-links the
/// alternates; later passes reuse the spare slot, resetting its effect
/// state. Either way the result mirrors the committed unit's internal state
/// so the begin phase can diff against it.
pub fn create_work_in_progress(
    arena: &mut Arena,
    current_id: UnitId,
    pending_props: UnitProps,
) -> UnitId {
    let wip_id = arena[current_id].alternate;

    let wip_id = match wip_id {
        Some(wip_id) => {
            let wip = &mut arena[wip_id];
            wip.pending_props = pending_props;
            wip.flags = EffectFlags::empty();
            wip.subtree_flags = EffectFlags::empty();
            wip.deletions.clear();
            wip_id
        }
        None => {
            let current = &arena[current_id];
            let mut wip = Unit::new(current.kind, pending_props, current.key.clone());
            wip.host_instance = current.host_instance;
            wip.alternate = Some(current_id);
            let wip_id = arena.insert(wip);
            arena[current_id].alternate = Some(wip_id);
            wip_id
        }
    };

    // Mirror the committed side.
    let current = &arena[current_id];
    let element_type = current.element_type.clone();
    let update_queue = current.update_queue.clone();
    let base_state = current.base_state.clone();
    let base_updates = current.base_updates.clone();
    let memoized_element = current.memoized_element.clone();
    let hooks = current.hooks.clone();
    let committed_props = current.committed_props.clone();
    let ref_binding = current.ref_binding.clone();
    let child = current.child;
    let lanes = current.lanes;
    let host_instance = current.host_instance;

    let wip = &mut arena[wip_id];
    wip.element_type = element_type;
    wip.update_queue = update_queue;
    wip.base_state = base_state;
    wip.base_updates = base_updates;
    wip.memoized_element = memoized_element;
    wip.hooks = hooks;
    wip.committed_props = committed_props;
    wip.ref_binding = ref_binding;
    wip.child = child;
    wip.lanes = lanes;
    wip.host_instance = host_instance;
    wip_id
}

// =============================================================================
// Root container
// =============================================================================

/// Per-root bookkeeping: the committed tree pointer, pending priorities,
/// the in-flight callback, and the passive-effect queues awaiting the
/// deferred commit sub-phase. Lives as long as the mount target.
pub struct UnitGraph {
    /// The committed HostRoot unit. Swapped at tree publish.
    pub root_unit: UnitId,
    /// Lanes with unprocessed updates anywhere in the tree.
    pub pending_lanes: Lanes,
    /// Lane consumed by the render that just finished, if any.
    pub finished_lane: Lanes,
    /// Fully rendered HostRoot awaiting commit.
    pub finished_work: Option<UnitId>,

    /// Outstanding render callback and the priority it was requested at,
    /// for cancellation and coalescing.
    pub callback_token: Option<TaskToken>,
    pub callback_priority: Lanes,
    /// Outstanding passive-effect callback.
    pub passive_token: Option<TaskToken>,
    pub passive_scheduled: bool,

    /// Units whose passive effects must run after the next commit.
    pub to_run: Vec<UnitId>,
    /// Effect records salvaged from deleted units; teardown-only.
    pub to_unmount: Vec<crate::hooks::EffectHook>,
}

impl UnitGraph {
    pub fn new(root_unit: UnitId) -> Self {
        Self {
            root_unit,
            pending_lanes: Lanes::empty(),
            finished_lane: Lanes::empty(),
            finished_work: None,
            callback_token: None,
            callback_priority: Lanes::empty(),
            passive_token: None,
            passive_scheduled: false,
            to_run: Vec::new(),
            to_unmount: Vec::new(),
        }
    }
}
