//! Per-slot update queues.
//!
//! Updates accumulate in a circular singly-linked pending list (a tail
//! handle whose `next` wraps to the head, so insertion is O(1) and
//! traversal starts at `tail.next`). The queue object is shared between the
//! two generations of a unit through `Rc`, so an enqueue can never land on
//! a stale copy across a tree swap.
//!
//! Processing replays updates against a base state for one render lane set.
//! Updates whose lane is not satisfied are not dropped: they are cloned
//! into a base queue that rides along to a later render, and the base state
//! freezes just before the first skipped update. Updates applied *after* a
//! skip are also cloned into the base queue (tagged with the empty lane set,
//! which every render satisfies) so the replay re-applies everything from
//! the freeze point in original submission order.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::lanes::Lanes;

/// Dynamically typed state slot value.
pub type StateValue = Rc<dyn Any>;

// =============================================================================
// Updates
// =============================================================================

/// What an update does to the previous state.
#[derive(Clone)]
pub enum Action {
    Replace(StateValue),
    Apply(Rc<dyn Fn(&StateValue) -> StateValue>),
}

impl Action {
    pub fn apply(&self, prev: &StateValue) -> StateValue {
        match self {
            Action::Replace(next) => next.clone(),
            Action::Apply(f) => f(prev),
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Replace(_) => f.write_str("Replace"),
            Action::Apply(_) => f.write_str("Apply"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Update {
    pub action: Action,
    pub lane: Lanes,
}

// =============================================================================
// Circular pending list
// =============================================================================

struct PendingNode {
    update: Update,
    next: usize,
}

/// The circular list proper: `tail` is the last-inserted node, whose `next`
/// wraps to the first.
struct PendingList {
    nodes: Vec<PendingNode>,
    tail: usize,
}

impl PendingList {
    fn singleton(update: Update) -> Self {
        Self {
            nodes: vec![PendingNode { update, next: 0 }],
            tail: 0,
        }
    }

    fn push(&mut self, update: Update) {
        let head = self.nodes[self.tail].next;
        let index = self.nodes.len();
        self.nodes.push(PendingNode { update, next: head });
        self.nodes[self.tail].next = index;
        self.tail = index;
    }

    /// Walk once from `tail.next` back around to the tail.
    fn into_ordered(self) -> Vec<Update> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut nodes: Vec<Option<PendingNode>> = self.nodes.into_iter().map(Some).collect();
        let mut cursor = nodes[self.tail].as_ref().expect("tail node").next;
        loop {
            let node = nodes[cursor].take().expect("pending list cycle revisited a node");
            let next = node.next;
            let at_tail = cursor == self.tail;
            out.push(node.update);
            if at_tail {
                break;
            }
            cursor = next;
        }
        out
    }
}

#[derive(Default)]
pub struct UpdateQueue {
    pending: Option<PendingList>,
}

/// Queue handle shared by both generations of a unit and by state setters.
pub type SharedQueue = Rc<RefCell<UpdateQueue>>;

pub fn new_shared_queue() -> SharedQueue {
    Rc::new(RefCell::new(UpdateQueue::default()))
}

impl UpdateQueue {
    pub fn enqueue(&mut self, update: Update) {
        match &mut self.pending {
            Some(list) => list.push(update),
            None => self.pending = Some(PendingList::singleton(update)),
        }
    }

    /// Drain the pending list in submission order.
    pub fn take_pending(&mut self) -> Vec<Update> {
        self.pending.take().map(PendingList::into_ordered).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

// =============================================================================
// Processing
// =============================================================================

pub struct Processed {
    /// The state after applying every satisfied update.
    pub memoized: StateValue,
    /// State to restart from when the base queue replays.
    pub base_state: StateValue,
    /// Updates carried forward to a later render, in original order.
    pub base_updates: Vec<Update>,
}

/// Replay `updates` (base queue first, then freshly drained pending) on top
/// of `base_state` for the given render lanes.
pub fn process_updates(
    base_state: StateValue,
    updates: impl IntoIterator<Item = Update>,
    render_lanes: Lanes,
) -> Processed {
    let mut memoized = base_state.clone();
    let mut new_base_state = base_state;
    let mut base_updates: Vec<Update> = Vec::new();

    for update in updates {
        if update.lane.is_satisfied_by(render_lanes) {
            if !base_updates.is_empty() {
                // Already skipping: keep this one in the replay run too.
                base_updates.push(Update {
                    action: update.action.clone(),
                    lane: Lanes::empty(),
                });
            }
            memoized = update.action.apply(&memoized);
        } else {
            if base_updates.is_empty() {
                new_base_state = memoized.clone();
            }
            base_updates.push(update);
        }
    }

    if base_updates.is_empty() {
        new_base_state = memoized.clone();
    }

    Processed {
        memoized,
        base_state: new_base_state,
        base_updates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_str(suffix: &'static str) -> Update {
        Update {
            action: Action::Apply(Rc::new(move |prev: &StateValue| {
                let prev = prev.downcast_ref::<String>().unwrap();
                Rc::new(format!("{prev}{suffix}"))
            })),
            lane: Lanes::SYNC,
        }
    }

    fn as_string(value: &StateValue) -> String {
        value.downcast_ref::<String>().unwrap().clone()
    }

    #[test]
    fn test_enqueue_preserves_order() {
        let mut queue = UpdateQueue::default();
        queue.enqueue(push_str("a"));
        queue.enqueue(push_str("b"));
        queue.enqueue(push_str("c"));

        let drained = queue.take_pending();
        assert_eq!(drained.len(), 3);
        assert!(queue.is_empty());

        let out = process_updates(Rc::new(String::new()), drained, Lanes::SYNC);
        assert_eq!(as_string(&out.memoized), "abc");
        assert!(out.base_updates.is_empty());
    }

    #[test]
    fn test_replace_wins_over_accumulated() {
        let mut queue = UpdateQueue::default();
        queue.enqueue(push_str("a"));
        queue.enqueue(Update {
            action: Action::Replace(Rc::new(String::from("reset"))),
            lane: Lanes::SYNC,
        });
        queue.enqueue(push_str("b"));

        let out = process_updates(Rc::new(String::new()), queue.take_pending(), Lanes::SYNC);
        assert_eq!(as_string(&out.memoized), "resetb");
    }

    #[test]
    fn test_skipped_update_freezes_base_state() {
        // Low-priority "a" arrives before high-priority "b"; render at SYNC.
        let mut low = push_str("a");
        low.lane = Lanes::TRANSITION;
        let high = push_str("b");

        let out = process_updates(
            Rc::new(String::new()),
            vec![low, high],
            Lanes::SYNC,
        );

        // The high update applied for display...
        assert_eq!(as_string(&out.memoized), "b");
        // ...but the base state froze before the skip, and both updates ride
        // along for the replay, in original order.
        assert_eq!(as_string(&out.base_state), "");
        assert_eq!(out.base_updates.len(), 2);

        let replay = process_updates(
            out.base_state,
            out.base_updates,
            Lanes::SYNC | Lanes::TRANSITION,
        );
        assert_eq!(as_string(&replay.memoized), "ab");
        assert!(replay.base_updates.is_empty());
    }
}
