//! Element description model.
//!
//! An [`Element`] is the declarative description of one node of the desired
//! tree: cheap to build, cheap to clone, consumed by the reconciler. The
//! authoring syntax above this model (macros, builders, a templating layer)
//! is out of scope; these constructor functions are the data model's own
//! surface.
//!
//! Identity rules used by the diff:
//! - host elements match by tag string,
//! - components match by [`ComponentDef`] pointer identity,
//! - providers match by context id,
//! - an optional [`Key`] overrides positional matching inside a sibling run.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Unwind;
use crate::hooks::HookCtx;
use crate::host::HostHandle;
use crate::types::{Key, Props};

/// What a component function produces: the next element, or an unwind
/// signal (suspension or a fatal usage error) propagated with `?`.
pub type Render = Result<Element, Unwind>;

// =============================================================================
// Component definitions
// =============================================================================

type ComponentFn = Rc<dyn Fn(&mut HookCtx<'_>, &Props) -> Render>;

/// A function component.
///
/// Create once and clone into elements; the `Rc` pointer is the component's
/// identity, so two defs built from the same closure are still different
/// component types.
#[derive(Clone)]
pub struct ComponentDef(ComponentFn);

impl ComponentDef {
    pub fn new(f: impl Fn(&mut HookCtx<'_>, &Props) -> Render + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// An element rendering this component with `props`.
    pub fn el(&self, props: Props) -> Element {
        Element::node(ElementKind::Component { def: self.clone(), props }, None)
    }

    /// Keyed variant of [`ComponentDef::el`].
    pub fn el_keyed(&self, key: impl Into<Key>, props: Props) -> Element {
        Element::node(
            ElementKind::Component { def: self.clone(), props },
            Some(key.into()),
        )
    }

    pub(crate) fn call(&self, ctx: &mut HookCtx<'_>, props: &Props) -> Render {
        (self.0)(ctx, props)
    }

    pub fn same(a: &ComponentDef, b: &ComponentDef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl std::fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentDef({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Context handles
// =============================================================================

/// Identity of a context, independent of its value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u32);

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(0);

/// Typed handle to a context.
///
/// Values become visible to descendants through provider elements and are
/// read back with [`HookCtx::use_context`]. There is no default value: a
/// read with no enclosing provider yields `None`.
pub struct Context<T> {
    id: ContextId,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Context<T> {}

impl<T: 'static> Context<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// An element making `value` visible to `children`.
    pub fn provide(&self, value: T, children: Vec<Element>) -> Element {
        Element::node(
            ElementKind::Provider {
                context: self.id,
                value: Rc::new(value),
                children,
            },
            None,
        )
    }
}

// =============================================================================
// Ref bindings
// =============================================================================

/// A slot the commit engine fills with the host handle of the element it is
/// bound to: attached during the layout sub-phase, cleared on deletion.
#[derive(Clone, Default)]
pub struct RefBinding(Rc<RefCell<Option<HostHandle>>>);

impl RefBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<HostHandle> {
        *self.0.borrow()
    }

    pub(crate) fn set(&self, handle: Option<HostHandle>) {
        *self.0.borrow_mut() = handle;
    }

    pub fn same(a: &RefBinding, b: &RefBinding) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl std::fmt::Debug for RefBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefBinding({:?})", self.get())
    }
}

// =============================================================================
// Elements
// =============================================================================

#[derive(Debug, Clone)]
pub enum Element {
    /// Renders nothing (and unmounts whatever was there).
    Empty,
    /// A text leaf.
    Text(Rc<str>),
    /// A host element, component, fragment, provider, or suspense boundary.
    Node(Rc<ElementNode>),
    /// An ordered run of children, diffed with the keyed algorithm.
    Sequence(Vec<Element>),
}

#[derive(Debug)]
pub struct ElementNode {
    pub kind: ElementKind,
    pub key: Option<Key>,
}

pub enum ElementKind {
    Host {
        tag: Rc<str>,
        props: Props,
        children: Vec<Element>,
        ref_binding: Option<RefBinding>,
    },
    Component {
        def: ComponentDef,
        props: Props,
    },
    Fragment {
        children: Vec<Element>,
    },
    Provider {
        context: ContextId,
        value: Rc<dyn Any>,
        children: Vec<Element>,
    },
    Suspense {
        children: Vec<Element>,
        fallback: Vec<Element>,
    },
}

impl std::fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Host { tag, children, .. } => {
                write!(f, "Host({tag}, {} children)", children.len())
            }
            ElementKind::Component { def, .. } => write!(f, "{def:?}"),
            ElementKind::Fragment { children } => {
                write!(f, "Fragment({} children)", children.len())
            }
            ElementKind::Provider { context, .. } => write!(f, "Provider({context:?})"),
            ElementKind::Suspense { .. } => f.write_str("Suspense"),
        }
    }
}

impl Element {
    fn node(kind: ElementKind, key: Option<Key>) -> Self {
        Element::Node(Rc::new(ElementNode { kind, key }))
    }

    /// Attach a key to a node element. No-op for text/empty/sequences,
    /// which carry no identity of their own.
    pub fn keyed(self, key: impl Into<Key>) -> Self {
        match self {
            Element::Node(node) => Element::node(
                // Nodes are shared via Rc; re-wrap rather than mutate.
                match Rc::try_unwrap(node) {
                    Ok(node) => node.kind,
                    Err(shared) => clone_kind(&shared.kind),
                },
                Some(key.into()),
            ),
            other => other,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Element::Node(node) => node.key.as_ref(),
            _ => None,
        }
    }
}

fn clone_kind(kind: &ElementKind) -> ElementKind {
    match kind {
        ElementKind::Host { tag, props, children, ref_binding } => ElementKind::Host {
            tag: tag.clone(),
            props: props.clone(),
            children: children.clone(),
            ref_binding: ref_binding.clone(),
        },
        ElementKind::Component { def, props } => ElementKind::Component {
            def: def.clone(),
            props: props.clone(),
        },
        ElementKind::Fragment { children } => ElementKind::Fragment { children: children.clone() },
        ElementKind::Provider { context, value, children } => ElementKind::Provider {
            context: *context,
            value: value.clone(),
            children: children.clone(),
        },
        ElementKind::Suspense { children, fallback } => ElementKind::Suspense {
            children: children.clone(),
            fallback: fallback.clone(),
        },
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// A host element: `host("div", props!{}, vec![...])`.
pub fn host(tag: impl AsRef<str>, props: Props, children: Vec<Element>) -> Element {
    Element::node(
        ElementKind::Host {
            tag: Rc::from(tag.as_ref()),
            props,
            children,
            ref_binding: None,
        },
        None,
    )
}

/// A host element with a [`RefBinding`] attached.
pub fn host_with_ref(
    tag: impl AsRef<str>,
    props: Props,
    children: Vec<Element>,
    ref_binding: RefBinding,
) -> Element {
    Element::node(
        ElementKind::Host {
            tag: Rc::from(tag.as_ref()),
            props,
            children,
            ref_binding: Some(ref_binding),
        },
        None,
    )
}

/// A text leaf.
pub fn text(content: impl AsRef<str>) -> Element {
    Element::Text(Rc::from(content.as_ref()))
}

/// An unkeyed grouping. At the top of a child position it unwraps to its
/// children before diffing; keyed (via [`Element::keyed`]) it reconciles as
/// a stable unit.
pub fn fragment(children: Vec<Element>) -> Element {
    Element::node(ElementKind::Fragment { children }, None)
}

/// A suspense boundary: shows `children`, or `fallback` while an async
/// dependency below is pending.
pub fn suspense(children: Vec<Element>, fallback: Vec<Element>) -> Element {
    Element::node(ElementKind::Suspense { children, fallback }, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    #[test]
    fn test_component_identity() {
        let a = ComponentDef::new(|_, _| Ok(Element::Empty));
        let b = ComponentDef::new(|_, _| Ok(Element::Empty));
        let a2 = a.clone();

        assert!(ComponentDef::same(&a, &a2));
        assert!(!ComponentDef::same(&a, &b));
    }

    #[test]
    fn test_keyed() {
        let el = host("div", props! {}, vec![]).keyed("row-1");
        assert_eq!(el.key().map(Key::as_str), Some("row-1"));
        assert_eq!(text("x").key(), None);
    }

    #[test]
    fn test_context_ids_unique() {
        let a: Context<i32> = Context::new();
        let b: Context<i32> = Context::new();
        assert_ne!(a.id(), b.id());
    }
}
