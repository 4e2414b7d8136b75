//! Lane model: bitset priorities for pending work.
//!
//! Smaller bit = higher priority, so isolating the lowest set bit picks the
//! most urgent lane without branching. A render pass runs for one lane set;
//! an update participates iff its lane is a subset of the lanes being
//! rendered.

use bitflags::bitflags;

use crate::scheduler::SchedulerPriority;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Lanes: u32 {
        /// Must commit before control returns to the host.
        const SYNC = 1 << 0;
        /// Continuous / user-blocking input.
        const INPUT_CONTINUOUS = 1 << 1;
        const DEFAULT = 1 << 2;
        /// Deferred UI updates started inside a transition scope.
        const TRANSITION = 1 << 3;
        const IDLE = 1 << 4;
    }
}

impl Lanes {
    pub fn merge(self, other: Lanes) -> Lanes {
        self | other
    }

    /// The single highest-priority lane in the set (lowest set bit),
    /// isolated with the two's-complement trick `set & -set`.
    pub fn highest_priority(self) -> Lanes {
        Lanes::from_bits_retain(self.bits() & self.bits().wrapping_neg())
    }

    /// Whether an update tagged with `self` participates in a render pass
    /// running for `render_lanes`.
    pub fn is_satisfied_by(self, render_lanes: Lanes) -> bool {
        render_lanes.contains(self)
    }
}

/// Translate the chosen render lane into the priority requested from the
/// external scheduler.
pub fn lanes_to_scheduler_priority(lanes: Lanes) -> SchedulerPriority {
    let lane = lanes.highest_priority();
    if lane == Lanes::SYNC {
        SchedulerPriority::Immediate
    } else if lane == Lanes::INPUT_CONTINUOUS {
        SchedulerPriority::UserBlocking
    } else if lane == Lanes::DEFAULT || lane == Lanes::TRANSITION {
        SchedulerPriority::Normal
    } else {
        SchedulerPriority::Idle
    }
}

/// Translate an ambient scheduler priority into the lane an update at that
/// priority is tagged with.
pub fn scheduler_priority_to_lane(priority: SchedulerPriority) -> Lanes {
    match priority {
        SchedulerPriority::Immediate => Lanes::SYNC,
        SchedulerPriority::UserBlocking => Lanes::INPUT_CONTINUOUS,
        SchedulerPriority::Normal | SchedulerPriority::Low => Lanes::DEFAULT,
        SchedulerPriority::Idle => Lanes::IDLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_is_lowest_bit() {
        let set = Lanes::DEFAULT | Lanes::SYNC | Lanes::IDLE;
        assert_eq!(set.highest_priority(), Lanes::SYNC);

        let set = Lanes::TRANSITION | Lanes::IDLE;
        assert_eq!(set.highest_priority(), Lanes::TRANSITION);

        assert_eq!(Lanes::empty().highest_priority(), Lanes::empty());
    }

    #[test]
    fn test_satisfaction_is_subset() {
        assert!(Lanes::SYNC.is_satisfied_by(Lanes::SYNC));
        assert!(!Lanes::TRANSITION.is_satisfied_by(Lanes::SYNC));
        assert!(Lanes::DEFAULT.is_satisfied_by(Lanes::DEFAULT | Lanes::TRANSITION));
    }

    #[test]
    fn test_priority_round_trip() {
        assert_eq!(
            lanes_to_scheduler_priority(Lanes::SYNC),
            SchedulerPriority::Immediate
        );
        assert_eq!(
            lanes_to_scheduler_priority(Lanes::TRANSITION),
            SchedulerPriority::Normal
        );
        assert_eq!(
            scheduler_priority_to_lane(SchedulerPriority::UserBlocking),
            Lanes::INPUT_CONTINUOUS
        );
        assert_eq!(
            scheduler_priority_to_lane(SchedulerPriority::Idle),
            Lanes::IDLE
        );
    }
}
