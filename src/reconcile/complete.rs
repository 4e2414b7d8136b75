//! Completion phase: bottom-up step of reconciliation.
//!
//! Runs post-order as the work loop climbs back out of a subtree. Host
//! units get their host instance here — created off-tree on first render,
//! with all already-built descendant host instances appended in one pass —
//! or an update flag when content/props changed. Provider and suspense
//! units pop the stacks their begin pushed. Every unit bubbles its own and
//! its children's effect flags upward, which is what lets the commit engine
//! visit only flagged subtrees.

use crate::engine::arena::{Arena, UnitId};
use crate::engine::flags::EffectFlags;
use crate::engine::unit::{ElementType, OffscreenMode, UnitKind, UnitProps};
use crate::host::HostAdapter;

use super::WorkContext;

pub(crate) fn complete_work(
    arena: &mut Arena,
    work: &mut WorkContext,
    host: &mut dyn HostAdapter,
    wip: UnitId,
) {
    log::trace!("complete {} ({:?})", wip, arena[wip].kind);
    match arena[wip].kind {
        UnitKind::HostComponent => {
            complete_host_component(arena, host, wip);
            bubble_properties(arena, wip);
        }
        UnitKind::HostText => {
            complete_host_text(arena, host, wip);
            bubble_properties(arena, wip);
        }
        UnitKind::FunctionComponent
        | UnitKind::HostRoot
        | UnitKind::Fragment
        | UnitKind::Offscreen => {
            bubble_properties(arena, wip);
        }
        UnitKind::ContextProvider => {
            let context = match &arena[wip].element_type {
                Some(ElementType::Provider(context)) => *context,
                other => unreachable!("provider unit with element type {other:?}"),
            };
            work.contexts.pop(context);
            bubble_properties(arena, wip);
        }
        UnitKind::Suspense => {
            work.suspense.pop();
            complete_suspense(arena, wip);
            bubble_properties(arena, wip);
        }
    }
}

// =============================================================================
// Host units
// =============================================================================

fn complete_host_component(arena: &mut Arena, host: &mut dyn HostAdapter, wip: UnitId) {
    let is_update = arena[wip].alternate.is_some() && arena[wip].host_instance.is_some();

    if is_update {
        // Value-level prop diffing belongs to the adapter; the flag only
        // records that there is anything to hand it, so an identical
        // re-render commits nothing.
        let changed = match (&arena[wip].pending_props, previous_props(arena, wip)) {
            (UnitProps::Host { attrs, .. }, Some(UnitProps::Host { attrs: old, .. })) => {
                attrs != old
            }
            _ => true,
        };
        if changed {
            arena[wip].flags |= EffectFlags::UPDATE;
        }
        return;
    }

    let (tag, attrs) = match (&arena[wip].element_type, &arena[wip].pending_props) {
        (Some(ElementType::Host(tag)), UnitProps::Host { attrs, .. }) => {
            (tag.clone(), attrs.clone())
        }
        other => unreachable!("host unit with {other:?}"),
    };
    let instance = host.create_element(&tag, &attrs);
    append_all_children(arena, host, instance, wip);
    arena[wip].host_instance = Some(instance);

    if arena[wip].ref_binding.is_some() {
        arena[wip].flags |= EffectFlags::REF;
    }
}

fn complete_host_text(arena: &mut Arena, host: &mut dyn HostAdapter, wip: UnitId) {
    let content = match &arena[wip].pending_props {
        UnitProps::Text(content) => content.clone(),
        other => unreachable!("text unit with {other:?} props"),
    };

    let is_update = arena[wip].alternate.is_some() && arena[wip].host_instance.is_some();
    if is_update {
        let changed = match previous_props(arena, wip) {
            Some(UnitProps::Text(old)) => *old != content,
            _ => true,
        };
        if changed {
            arena[wip].flags |= EffectFlags::UPDATE;
        }
    } else {
        // Text nodes have no children to append.
        arena[wip].host_instance = Some(host.create_text(&content));
    }
}

/// Props the committed generation rendered with, if any.
fn previous_props<'a>(arena: &'a Arena, wip: UnitId) -> Option<&'a UnitProps> {
    let alternate = arena[wip].alternate?;
    arena[alternate].committed_props.as_ref()
}

/// Attach every descendant host instance built so far to a freshly created
/// instance, skipping non-host intermediate units in one pass.
fn append_all_children(
    arena: &Arena,
    host: &mut dyn HostAdapter,
    parent: crate::host::HostHandle,
    wip: UnitId,
) {
    let mut node = arena[wip].child;
    while let Some(id) = node {
        let unit = &arena[id];
        if unit.is_host() {
            let instance = unit.host_instance.expect("completed host unit without instance");
            host.append_initial_child(parent, instance);
        } else if let Some(child) = unit.child {
            node = Some(child);
            continue;
        }

        // Next sibling, climbing back toward `wip` as runs end.
        let mut cursor = id;
        loop {
            if let Some(sibling) = arena[cursor].sibling {
                node = Some(sibling);
                break;
            }
            match arena[cursor].parent {
                None => return,
                Some(parent_id) if parent_id == wip => return,
                Some(parent_id) => cursor = parent_id,
            }
        }
    }
}

// =============================================================================
// Suspense visibility
// =============================================================================

/// Compare the offscreen child's visibility mode between generations; a
/// flip is committed as a hide/unhide, not a structural change.
fn complete_suspense(arena: &mut Arena, wip: UnitId) {
    let Some(offscreen) = arena[wip].child else {
        return;
    };
    let is_hidden = matches!(
        arena[offscreen].pending_props,
        UnitProps::Offscreen { mode: OffscreenMode::Hidden, .. }
    );

    match arena[offscreen].alternate {
        Some(current_offscreen) => {
            let was_hidden = matches!(
                arena[current_offscreen].pending_props,
                UnitProps::Offscreen { mode: OffscreenMode::Hidden, .. }
            );
            if was_hidden != is_hidden {
                arena[offscreen].flags |= EffectFlags::VISIBILITY;
            }
        }
        None if is_hidden => {
            arena[offscreen].flags |= EffectFlags::VISIBILITY;
        }
        None => {}
    }
}

// =============================================================================
// Flag bubbling
// =============================================================================

/// OR each child's own and subtree flags into this unit's subtree flags.
/// After this, a clean `subtree_flags` proves the whole subtree can be
/// skipped by commit traversals.
fn bubble_properties(arena: &mut Arena, wip: UnitId) {
    let mut subtree = EffectFlags::empty();
    let mut child = arena[wip].child;
    while let Some(id) = child {
        subtree |= arena[id].subtree_flags | arena[id].flags;
        arena[id].parent = Some(wip);
        child = arena[id].sibling;
    }
    arena[wip].subtree_flags |= subtree;
}
