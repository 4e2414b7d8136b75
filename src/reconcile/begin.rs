//! Begin phase: top-down step of reconciliation.
//!
//! Given a work-in-progress unit, compute its next children (draining
//! update queues, re-invoking component functions, diffing props) and
//! return the first child to descend into — or `None` at a leaf, handing
//! control to the completion phase. Pure tree construction: no host
//! mutation happens here, only effect flags and deletion lists.

use std::rc::Rc;

use crate::element::{Element, RefBinding};
use crate::engine::arena::{Arena, UnitId};
use crate::engine::flags::EffectFlags;
use crate::engine::lanes::Lanes;
use crate::engine::unit::{
    create_work_in_progress, unit_from_fragment, unit_from_offscreen, ElementType, OffscreenMode,
    UnitKind, UnitProps,
};
use crate::engine::update_queue::{process_updates, StateValue};
use crate::error::Unwind;
use crate::hooks::render_with_hooks;
use crate::shared::SharedHandle;

use super::children::reconcile_child_units;
use super::WorkContext;

pub(crate) fn begin_work(
    arena: &mut Arena,
    work: &mut WorkContext,
    shared: &SharedHandle,
    wip: UnitId,
    render_lane: Lanes,
) -> Result<Option<UnitId>, Unwind> {
    log::trace!("begin {} ({:?})", wip, arena[wip].kind);
    match arena[wip].kind {
        UnitKind::HostRoot => Ok(update_host_root(arena, wip, render_lane)),
        UnitKind::HostComponent => Ok(update_host_component(arena, wip)),
        UnitKind::HostText => Ok(None),
        UnitKind::FunctionComponent => {
            update_function_component(arena, work, shared, wip, render_lane)
        }
        UnitKind::Fragment => Ok(update_fragment(arena, wip)),
        UnitKind::ContextProvider => Ok(update_context_provider(arena, work, wip)),
        UnitKind::Suspense => Ok(update_suspense(arena, work, wip)),
        UnitKind::Offscreen => Ok(update_offscreen(arena, wip)),
    }
}

/// Diff `children` against the previous generation's children of this unit.
/// Effects are only tracked when a previous generation exists; on fresh
/// mounts the subtree root's single placement covers the whole subtree.
fn reconcile_children(arena: &mut Arena, wip: UnitId, children: &[Element]) -> Option<UnitId> {
    let current = arena[wip].alternate;
    let current_first = current.and_then(|id| arena[id].child);
    let first = reconcile_child_units(arena, wip, current_first, children, current.is_some());
    arena[wip].child = first;
    first
}

// =============================================================================
// Per-kind begin
// =============================================================================

fn update_host_root(arena: &mut Arena, wip: UnitId, render_lane: Lanes) -> Option<UnitId> {
    let queue = arena[wip]
        .update_queue
        .clone()
        .expect("host root without an update queue");
    let pending = queue.borrow_mut().take_pending();

    // Keep drained updates replayable on the committed side: if this render
    // is discarded for a different lane, a fresh stack clones from there.
    if !pending.is_empty() {
        if let Some(current) = arena[wip].alternate {
            arena[current].base_updates.extend(pending.iter().cloned());
        }
    }

    let mut updates = arena[wip].base_updates.clone();
    updates.extend(pending);
    let base = arena[wip]
        .base_state
        .clone()
        .unwrap_or_else(|| Rc::new(Element::Empty) as StateValue);

    let processed = process_updates(base, updates, render_lane);
    let element = processed
        .memoized
        .downcast_ref::<Element>()
        .cloned()
        .unwrap_or(Element::Empty);

    {
        let unit = &mut arena[wip];
        unit.base_state = Some(processed.base_state);
        unit.base_updates = processed.base_updates;
        unit.memoized_element = Some(element.clone());
    }

    reconcile_children(arena, wip, std::slice::from_ref(&element))
}

fn update_host_component(arena: &mut Arena, wip: UnitId) -> Option<UnitId> {
    let children = match &arena[wip].pending_props {
        UnitProps::Host { children, .. } => children.clone(),
        other => unreachable!("host unit with {other:?} props"),
    };
    mark_ref(arena, wip);
    reconcile_children(arena, wip, &children)
}

fn update_function_component(
    arena: &mut Arena,
    work: &mut WorkContext,
    shared: &SharedHandle,
    wip: UnitId,
    render_lane: Lanes,
) -> Result<Option<UnitId>, Unwind> {
    let child = render_with_hooks(arena, &work.contexts, shared, wip, render_lane)?;
    Ok(reconcile_children(arena, wip, std::slice::from_ref(&child)))
}

fn update_fragment(arena: &mut Arena, wip: UnitId) -> Option<UnitId> {
    let children = match &arena[wip].pending_props {
        UnitProps::Elements(children) => children.clone(),
        other => unreachable!("fragment unit with {other:?} props"),
    };
    reconcile_children(arena, wip, &children)
}

fn update_context_provider(arena: &mut Arena, work: &mut WorkContext, wip: UnitId) -> Option<UnitId> {
    let context = match &arena[wip].element_type {
        Some(ElementType::Provider(context)) => *context,
        other => unreachable!("provider unit with element type {other:?}"),
    };
    let (value, children) = match &arena[wip].pending_props {
        UnitProps::Provider { value, children } => (value.clone(), children.clone()),
        other => unreachable!("provider unit with {other:?} props"),
    };
    work.contexts.push(context, value);
    reconcile_children(arena, wip, &children)
}

fn update_offscreen(arena: &mut Arena, wip: UnitId) -> Option<UnitId> {
    let children = match &arena[wip].pending_props {
        UnitProps::Offscreen { children, .. } => children.clone(),
        other => unreachable!("offscreen unit with {other:?} props"),
    };
    reconcile_children(arena, wip, &children)
}

// =============================================================================
// Suspense
// =============================================================================

/// A suspense boundary renders its primary children inside an offscreen
/// unit; while suspended, the offscreen flips to hidden and a fallback
/// fragment mounts as its sibling. Four paths: mount/update crossed with
/// primary/fallback.
fn update_suspense(arena: &mut Arena, work: &mut WorkContext, wip: UnitId) -> Option<UnitId> {
    let current = arena[wip].alternate;

    let show_fallback = arena[wip].flags.contains(EffectFlags::DID_CAPTURE);
    if show_fallback {
        arena[wip].flags -= EffectFlags::DID_CAPTURE;
    }

    let (children, fallback) = match &arena[wip].pending_props {
        UnitProps::Suspense { children, fallback } => (children.clone(), fallback.clone()),
        other => unreachable!("suspense unit with {other:?} props"),
    };

    work.suspense.push(wip);

    match (current, show_fallback) {
        (None, false) => Some(mount_suspense_primary(arena, wip, children)),
        (None, true) => Some(mount_suspense_fallback(arena, wip, children, fallback)),
        (Some(current), false) => Some(update_suspense_primary(arena, wip, current, children)),
        (Some(current), true) => {
            Some(update_suspense_fallback(arena, wip, current, children, fallback))
        }
    }
}

fn mount_suspense_primary(arena: &mut Arena, wip: UnitId, children: Vec<Element>) -> UnitId {
    // The fallback is not built until something actually suspends.
    let primary = arena.insert(unit_from_offscreen(OffscreenMode::Visible, children));
    arena[primary].parent = Some(wip);
    arena[wip].child = Some(primary);
    primary
}

fn mount_suspense_fallback(
    arena: &mut Arena,
    wip: UnitId,
    children: Vec<Element>,
    fallback: Vec<Element>,
) -> UnitId {
    let primary = arena.insert(unit_from_offscreen(OffscreenMode::Hidden, children));
    let fallback = arena.insert(unit_from_fragment(fallback, None));
    // The boundary itself mounted without effect tracking, so the fallback
    // must carry its own placement.
    arena[fallback].flags |= EffectFlags::PLACEMENT;

    arena[primary].parent = Some(wip);
    arena[fallback].parent = Some(wip);
    arena[primary].sibling = Some(fallback);
    arena[wip].child = Some(primary);
    fallback
}

fn update_suspense_primary(
    arena: &mut Arena,
    wip: UnitId,
    current: UnitId,
    children: Vec<Element>,
) -> UnitId {
    let current_primary = arena[current].child.expect("suspense without primary child");
    let current_fallback = arena[current_primary].sibling;

    let primary = create_work_in_progress(
        arena,
        current_primary,
        UnitProps::Offscreen {
            mode: OffscreenMode::Visible,
            children,
        },
    );
    arena[primary].parent = Some(wip);
    arena[primary].sibling = None;
    arena[wip].child = Some(primary);

    // Leaving fallback mode: the fallback subtree goes away.
    if let Some(fallback) = current_fallback {
        let unit = &mut arena[wip];
        unit.deletions.push(fallback);
        unit.flags |= EffectFlags::CHILD_DELETION;
    }
    primary
}

fn update_suspense_fallback(
    arena: &mut Arena,
    wip: UnitId,
    current: UnitId,
    children: Vec<Element>,
    fallback_children: Vec<Element>,
) -> UnitId {
    let current_primary = arena[current].child.expect("suspense without primary child");
    let current_fallback = arena[current_primary].sibling;

    let primary = create_work_in_progress(
        arena,
        current_primary,
        UnitProps::Offscreen {
            mode: OffscreenMode::Hidden,
            children,
        },
    );

    let fallback = match current_fallback {
        Some(current_fallback) => create_work_in_progress(
            arena,
            current_fallback,
            UnitProps::Elements(fallback_children),
        ),
        None => {
            let fallback = arena.insert(unit_from_fragment(fallback_children, None));
            arena[fallback].flags |= EffectFlags::PLACEMENT;
            fallback
        }
    };

    arena[primary].parent = Some(wip);
    arena[fallback].parent = Some(wip);
    arena[primary].sibling = Some(fallback);
    arena[fallback].sibling = None;
    arena[wip].child = Some(primary);
    fallback
}

// =============================================================================
// Refs
// =============================================================================

/// Flag a host unit whose ref binding appeared, disappeared, or changed
/// identity since the committed generation.
fn mark_ref(arena: &mut Arena, wip: UnitId) {
    let changed = match arena[wip].alternate {
        None => arena[wip].ref_binding.is_some(),
        Some(current) => match (&arena[current].ref_binding, &arena[wip].ref_binding) {
            (None, None) => false,
            (Some(old), Some(new)) => !RefBinding::same(old, new),
            _ => true,
        },
    };
    if changed {
        arena[wip].flags |= EffectFlags::REF;
    }
}
