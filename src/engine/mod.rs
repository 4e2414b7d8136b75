//! The reconciliation engine's data structures: the unit arena, the node
//! model with its two-generation pairing, side-effect flags, the lane
//! priority model, and per-slot update queues.

pub mod arena;
pub mod flags;
pub mod lanes;
pub mod unit;
pub mod update_queue;

pub use arena::{Arena, UnitId};
pub use flags::EffectFlags;
pub use lanes::{lanes_to_scheduler_priority, scheduler_priority_to_lane, Lanes};
pub use unit::{
    create_work_in_progress, element_type_of, unit_from_element, unit_from_fragment,
    unit_from_offscreen, unit_from_text, ElementType, OffscreenMode, Unit, UnitGraph, UnitKind,
    UnitProps,
};
pub use update_queue::{
    new_shared_queue, process_updates, Action, Processed, SharedQueue, StateValue, Update,
    UpdateQueue,
};
