//! Child diffing: match a unit's previous children against the next child
//! description, reusing units where key and type agree.
//!
//! Two paths. A single next child scans the previous sibling chain once:
//! key match + type match reuses the unit and deletes the rest; key match
//! with a different type deletes the match and everything after it; a key
//! miss deletes just that sibling and keeps scanning. An ordered sequence
//! builds a `key ?? index → unit` map over the whole previous run, then
//! walks the next sequence once, reusing compatible units and flagging
//! moves against a high-water mark of previous indices. Whatever is left in
//! the map is marked deleted.
//!
//! The high-water pass is O(n) and approximates minimal moves; it is
//! optimal for append/prepend/stable-reorder shapes and accepts extra moves
//! otherwise. Deletions and placements are only *recorded* here (flags +
//! parent deletion lists); the commit engine executes them.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::element::{Element, ElementKind, ElementNode};
use crate::engine::arena::{Arena, UnitId};
use crate::engine::flags::EffectFlags;
use crate::engine::unit::{
    create_work_in_progress, element_type_of, unit_from_element, unit_from_fragment,
    unit_from_text, unit_props_from_element, Unit, UnitKind, UnitProps,
};
use crate::types::Key;

/// Diff `children` against the previous sibling chain starting at
/// `current_first`, producing the first next-generation child.
///
/// `track` is false on fresh mounts: nothing existed before, so neither
/// deletions nor per-child placements are recorded (the subtree's root
/// carries the one placement that matters).
pub(crate) fn reconcile_child_units(
    arena: &mut Arena,
    wip: UnitId,
    current_first: Option<UnitId>,
    children: &[Element],
    track: bool,
) -> Option<UnitId> {
    if children.len() == 1 {
        match &children[0] {
            Element::Empty => {
                delete_remaining_children(arena, wip, current_first, track);
                return None;
            }
            Element::Text(content) => {
                let child = reconcile_single_text(arena, wip, current_first, content, track);
                return Some(place_single_child(arena, child, track));
            }
            Element::Sequence(seq) => {
                return reconcile_array(arena, wip, current_first, seq, track);
            }
            Element::Node(node) => {
                // An unkeyed fragment wrapper at the top of a child position
                // is a grouping, not a unit: unwrap to its sequence.
                if let ElementKind::Fragment { children: inner } = &node.kind {
                    if node.key.is_none() {
                        return reconcile_array(arena, wip, current_first, inner, track);
                    }
                }
                let child = reconcile_single_element(arena, wip, current_first, node, track);
                return Some(place_single_child(arena, child, track));
            }
        }
    }

    if children.is_empty() {
        delete_remaining_children(arena, wip, current_first, track);
        return None;
    }

    reconcile_array(arena, wip, current_first, children, track)
}

// =============================================================================
// Deletion bookkeeping
// =============================================================================

fn delete_child(arena: &mut Arena, wip: UnitId, child: UnitId, track: bool) {
    if !track {
        return;
    }
    let parent = &mut arena[wip];
    parent.deletions.push(child);
    parent.flags |= EffectFlags::CHILD_DELETION;
}

fn delete_remaining_children(
    arena: &mut Arena,
    wip: UnitId,
    first: Option<UnitId>,
    track: bool,
) {
    if !track {
        return;
    }
    let mut cursor = first;
    while let Some(id) = cursor {
        cursor = arena[id].sibling;
        delete_child(arena, wip, id, track);
    }
}

// =============================================================================
// Reuse helpers
// =============================================================================

/// Clone `current` into its work-in-progress slot as a detached child.
fn use_unit(arena: &mut Arena, current: UnitId, props: UnitProps) -> UnitId {
    let wip = create_work_in_progress(arena, current, props);
    let unit = &mut arena[wip];
    unit.index = 0;
    unit.sibling = None;
    wip
}

/// Whether `unit` can be reused for `node` (same structural kind and, where
/// one exists, same element type).
fn element_matches_unit(node: &ElementNode, unit: &Unit) -> bool {
    match (&node.kind, unit.kind) {
        (ElementKind::Fragment { .. }, UnitKind::Fragment) => true,
        (ElementKind::Suspense { .. }, UnitKind::Suspense) => true,
        (ElementKind::Host { .. }, UnitKind::HostComponent)
        | (ElementKind::Component { .. }, UnitKind::FunctionComponent)
        | (ElementKind::Provider { .. }, UnitKind::ContextProvider) => {
            match (element_type_of(node), &unit.element_type) {
                (Some(next), Some(prev)) => next.matches(prev),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Carry the element's ref binding onto the (new or reused) unit.
fn assign_ref(arena: &mut Arena, id: UnitId, node: &ElementNode) {
    if let ElementKind::Host { ref_binding, .. } = &node.kind {
        arena[id].ref_binding = ref_binding.clone();
    }
}

fn place_single_child(arena: &mut Arena, child: UnitId, track: bool) -> UnitId {
    if track && arena[child].alternate.is_none() {
        arena[child].flags |= EffectFlags::PLACEMENT;
    }
    child
}

// =============================================================================
// Single-child paths
// =============================================================================

fn reconcile_single_element(
    arena: &mut Arena,
    wip: UnitId,
    current_first: Option<UnitId>,
    node: &Rc<ElementNode>,
    track: bool,
) -> UnitId {
    let mut cursor = current_first;
    while let Some(current) = cursor {
        if arena[current].key == node.key {
            if element_matches_unit(node, &arena[current]) {
                // Reuse; everything after it is gone.
                let rest = arena[current].sibling;
                let existing = use_unit(arena, current, unit_props_from_element(node));
                assign_ref(arena, existing, node);
                arena[existing].parent = Some(wip);
                delete_remaining_children(arena, wip, rest, track);
                return existing;
            }
            // Same key, different type: nothing below is salvageable.
            delete_remaining_children(arena, wip, Some(current), track);
            break;
        }
        // Key miss: this sibling is gone, keep scanning.
        delete_child(arena, wip, current, track);
        cursor = arena[current].sibling;
    }

    let mut unit = unit_from_element(node);
    unit.parent = Some(wip);
    arena.insert(unit)
}

fn reconcile_single_text(
    arena: &mut Arena,
    wip: UnitId,
    current_first: Option<UnitId>,
    content: &Rc<str>,
    track: bool,
) -> UnitId {
    let mut cursor = current_first;
    while let Some(current) = cursor {
        if arena[current].kind == UnitKind::HostText {
            let rest = arena[current].sibling;
            let existing = use_unit(arena, current, UnitProps::Text(content.clone()));
            arena[existing].parent = Some(wip);
            delete_remaining_children(arena, wip, rest, track);
            return existing;
        }
        delete_child(arena, wip, current, track);
        cursor = arena[current].sibling;
    }

    let mut unit = unit_from_text(content.clone());
    unit.parent = Some(wip);
    arena.insert(unit)
}

// =============================================================================
// Ordered-sequence path
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Keyed(Key),
    Index(u32),
}

fn map_key_of(unit: &Unit) -> MapKey {
    match &unit.key {
        Some(key) => MapKey::Keyed(key.clone()),
        None => MapKey::Index(unit.index),
    }
}

fn reconcile_array(
    arena: &mut Arena,
    wip: UnitId,
    current_first: Option<UnitId>,
    children: &[Element],
    track: bool,
) -> Option<UnitId> {
    // 1. Index the entire previous run in one pass.
    let mut existing: FxHashMap<MapKey, UnitId> = FxHashMap::default();
    let mut cursor = current_first;
    while let Some(id) = cursor {
        existing.insert(map_key_of(&arena[id]), id);
        cursor = arena[id].sibling;
    }

    // 2. Single forward pass over the next sequence.
    let mut last_placed_index: u32 = 0;
    let mut first_new: Option<UnitId> = None;
    let mut last_new: Option<UnitId> = None;

    for (position, element) in children.iter().enumerate() {
        let position = position as u32;
        let Some(new_id) = reuse_or_create(arena, &mut existing, position, element) else {
            continue;
        };

        {
            let unit = &mut arena[new_id];
            unit.index = position;
            unit.parent = Some(wip);
            unit.sibling = None;
        }
        match last_new {
            None => first_new = Some(new_id),
            Some(prev) => arena[prev].sibling = Some(new_id),
        }
        last_new = Some(new_id);

        if !track {
            continue;
        }

        // 3. Stay or move, against the high-water mark of previous indices.
        match arena[new_id].alternate {
            Some(alternate) => {
                let old_index = arena[alternate].index;
                if old_index < last_placed_index {
                    arena[new_id].flags |= EffectFlags::PLACEMENT;
                } else {
                    last_placed_index = old_index;
                }
            }
            None => {
                arena[new_id].flags |= EffectFlags::PLACEMENT;
            }
        }
    }

    // 4. Anything unconsumed is deleted.
    let leftovers: Vec<UnitId> = existing.into_values().collect();
    for id in leftovers {
        delete_child(arena, wip, id, track);
    }

    first_new
}

/// Look up a reusable previous unit for one position of the next sequence;
/// clone it when compatible, create fresh otherwise.
fn reuse_or_create(
    arena: &mut Arena,
    existing: &mut FxHashMap<MapKey, UnitId>,
    position: u32,
    element: &Element,
) -> Option<UnitId> {
    match element {
        Element::Empty => None,
        Element::Text(content) => {
            let map_key = MapKey::Index(position);
            if let Some(&before) = existing.get(&map_key) {
                if arena[before].kind == UnitKind::HostText {
                    existing.remove(&map_key);
                    return Some(use_unit(arena, before, UnitProps::Text(content.clone())));
                }
            }
            Some(arena.insert(unit_from_text(content.clone())))
        }
        Element::Node(node) => {
            let map_key = match &node.key {
                Some(key) => MapKey::Keyed(key.clone()),
                None => MapKey::Index(position),
            };
            if let Some(&before) = existing.get(&map_key) {
                if element_matches_unit(node, &arena[before]) {
                    existing.remove(&map_key);
                    let id = use_unit(arena, before, unit_props_from_element(node));
                    assign_ref(arena, id, node);
                    return Some(id);
                }
            }
            let id = arena.insert(unit_from_element(node));
            Some(id)
        }
        // A nested sequence reconciles as an index-keyed fragment.
        Element::Sequence(seq) => {
            let map_key = MapKey::Index(position);
            if let Some(&before) = existing.get(&map_key) {
                if arena[before].kind == UnitKind::Fragment {
                    existing.remove(&map_key);
                    return Some(use_unit(arena, before, UnitProps::Elements(seq.clone())));
                }
            }
            Some(arena.insert(unit_from_fragment(seq.clone(), None)))
        }
    }
}
