//! Side-effect flags.
//!
//! Each unit carries the flags describing its own pending mutations plus
//! the OR of everything below it (`subtree_flags`, established bottom-up by
//! the completion phase). The commit engine intersects `subtree_flags` with
//! a per-phase mask to skip untouched subtrees entirely.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EffectFlags: u32 {
        /// Insert or move this unit's host node.
        const PLACEMENT = 1 << 1;
        /// Props or text content changed.
        const UPDATE = 1 << 2;
        /// One or more children are slated for deletion.
        const CHILD_DELETION = 1 << 3;
        /// A passive effect must run after commit.
        const PASSIVE = 1 << 4;
        /// A ref binding must be (re)attached.
        const REF = 1 << 5;
        /// An offscreen subtree flipped between visible and hidden.
        const VISIBILITY = 1 << 6;
        /// A suspense boundary caught a suspension this pass.
        const DID_CAPTURE = 1 << 7;
        /// Set on the nearest boundary when a descendant suspends; the
        /// unwind walk converts it into DID_CAPTURE.
        const SHOULD_CAPTURE = 1 << 12;
    }
}

impl EffectFlags {
    /// Flags handled by the mutation sub-phase.
    pub const MUTATION_MASK: EffectFlags = EffectFlags::PLACEMENT
        .union(EffectFlags::UPDATE)
        .union(EffectFlags::CHILD_DELETION)
        .union(EffectFlags::REF)
        .union(EffectFlags::VISIBILITY);

    /// Flags handled by the layout sub-phase.
    pub const LAYOUT_MASK: EffectFlags = EffectFlags::REF;

    /// Flags that require scheduling a passive-effect flush. Deletions are
    /// included because deleted function units queue unmount teardowns.
    pub const PASSIVE_MASK: EffectFlags =
        EffectFlags::PASSIVE.union(EffectFlags::CHILD_DELETION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_disjoint_from_capture_bits() {
        assert!(!EffectFlags::MUTATION_MASK.contains(EffectFlags::DID_CAPTURE));
        assert!(!EffectFlags::MUTATION_MASK.contains(EffectFlags::SHOULD_CAPTURE));
    }

    #[test]
    fn test_passive_mask_includes_deletion() {
        assert!(EffectFlags::PASSIVE_MASK.contains(EffectFlags::CHILD_DELETION));
    }
}
