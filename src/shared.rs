//! State shared between the runtime and the handles that escape it.
//!
//! State setters, transition scopes, and async-value pings are plain
//! cloneable handles the caller may invoke at any time, including while a
//! render holds the arena. Instead of reentering the work loop they push
//! requests into this mailbox; the root drains it at its entry points and
//! turns requests into lane marks plus a scheduling pass. One mailbox per
//! root; single-threaded.

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::arena::UnitId;
use crate::engine::lanes::{scheduler_priority_to_lane, Lanes};
use crate::scheduler::SchedulerPriority;

/// A deferred `scheduleUpdate` call: mark `unit` (when known) and the root
/// with `lane`, then re-run the scheduling decision.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleRequest {
    pub unit: Option<UnitId>,
    pub lane: Lanes,
}

pub struct SharedState {
    pub requests: Vec<ScheduleRequest>,
    /// Set while a transition scope runs; updates dispatched inside take
    /// the transition lane.
    pub in_transition: bool,
    /// Priority of the scheduler context currently executing, if any.
    pub ambient_priority: Option<SchedulerPriority>,
}

pub type SharedHandle = Rc<RefCell<SharedState>>;

pub fn new_shared() -> SharedHandle {
    Rc::new(RefCell::new(SharedState {
        requests: Vec::new(),
        in_transition: false,
        ambient_priority: None,
    }))
}

/// Derive the lane for a freshly requested update: the transition marker
/// wins, otherwise the ambient scheduler priority translates to its lane.
///
/// Panics when neither is present — requesting work with no priority
/// context is a caller error, surfaced synchronously (wrap dispatch sites
/// in [`crate::Root::run_with_priority`] or a transition scope).
pub fn request_update_lane(shared: &SharedHandle) -> Lanes {
    let shared = shared.borrow();
    if shared.in_transition {
        return Lanes::TRANSITION;
    }
    match shared.ambient_priority {
        Some(priority) => scheduler_priority_to_lane(priority),
        None => panic!(
            "update requested outside any scheduler context or transition; \
             dispatch through Root::run_with_priority or a transition scope"
        ),
    }
}
