//! Unwind: recover from a suspended render.
//!
//! When the begin phase surfaces [`crate::error::Unwind::Suspended`], the
//! work loop hands the throw point here. The pending cell gets a retry ping
//! for the render lane, the nearest enclosing boundary is marked to
//! capture, and the walk climbs from the throw point toward the root,
//! unwinding stack entries and clearing deletion scratch as it goes. The
//! first boundary that wants to capture becomes the resumption point — its
//! re-render shows the fallback. Reaching the root means there is no
//! boundary, and the render is unrecoverable.

use std::rc::Rc;

use crate::engine::arena::{Arena, UnitId};
use crate::engine::flags::EffectFlags;
use crate::engine::lanes::Lanes;
use crate::engine::unit::{ElementType, UnitKind};
use crate::shared::SharedHandle;

use super::suspense::AsyncCell;
use super::WorkContext;

/// Returns the boundary to resume from, or `None` when no enclosing
/// boundary exists.
pub(crate) fn throw_and_unwind(
    arena: &mut Arena,
    work: &mut WorkContext,
    shared: &SharedHandle,
    from: UnitId,
    cell: Rc<AsyncCell>,
    lane: Lanes,
) -> Option<UnitId> {
    // Retry when the value lands, whether or not a boundary catches now.
    cell.attach_ping(shared, lane);

    if let Some(boundary) = work.suspense.current() {
        arena[boundary].flags |= EffectFlags::SHOULD_CAPTURE;
    } else {
        log::debug!("suspension at {from} with no boundary on the stack");
    }

    let mut incomplete = Some(from);
    while let Some(unit) = incomplete {
        if let Some(boundary) = unwind_unit(arena, work, unit) {
            log::debug!("suspension captured by boundary {boundary}");
            return Some(boundary);
        }
        let parent = arena[unit].parent;
        if let Some(parent) = parent {
            // Effects recorded below the abandoned path are void.
            arena[parent].deletions.clear();
            arena[parent].flags -= EffectFlags::CHILD_DELETION;
        }
        incomplete = parent;
    }
    None
}

/// Undo one unit's begin-phase stack effects; a capturing boundary returns
/// itself as the new work-in-progress.
fn unwind_unit(arena: &mut Arena, work: &mut WorkContext, unit: UnitId) -> Option<UnitId> {
    match arena[unit].kind {
        UnitKind::Suspense => {
            work.suspense.pop();
            let flags = arena[unit].flags;
            if flags.contains(EffectFlags::SHOULD_CAPTURE)
                && !flags.contains(EffectFlags::DID_CAPTURE)
            {
                arena[unit].flags =
                    (flags - EffectFlags::SHOULD_CAPTURE) | EffectFlags::DID_CAPTURE;
                return Some(unit);
            }
            None
        }
        UnitKind::ContextProvider => {
            let context = match &arena[unit].element_type {
                Some(ElementType::Provider(context)) => *context,
                other => unreachable!("provider unit with element type {other:?}"),
            };
            work.contexts.pop(context);
            None
        }
        _ => None,
    }
}
