//! Provider value stack.
//!
//! Context values are visible to a unit iff a provider for that context is
//! on the path from the root to the unit *in the tree currently being
//! rendered*. That is maintained as an explicit save-stack keyed by context
//! identity: the begin phase pushes a provider's value, the completion
//! phase (and the unwind walk) pops it, restoring whatever an outer
//! provider of the same context had set.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::element::ContextId;

#[derive(Default)]
pub struct ContextStack {
    /// Value currently visible per context.
    current: FxHashMap<ContextId, Rc<dyn Any>>,
    /// Save stack: the value (or absence) each push displaced.
    saved: Vec<(ContextId, Option<Rc<dyn Any>>)>,
}

impl ContextStack {
    pub fn push(&mut self, context: ContextId, value: Rc<dyn Any>) {
        let displaced = self.current.insert(context, value);
        self.saved.push((context, displaced));
    }

    /// Pop the most recent push, which must be for `context` — providers
    /// nest strictly, so a mismatch is a violated traversal invariant.
    pub fn pop(&mut self, context: ContextId) {
        let (pushed, displaced) = self
            .saved
            .pop()
            .expect("popped an empty provider stack");
        debug_assert_eq!(pushed, context, "provider pop out of order");
        match displaced {
            Some(value) => self.current.insert(context, value),
            None => self.current.remove(&context),
        };
    }

    pub fn read(&self, context: ContextId) -> Option<Rc<dyn Any>> {
        self.current.get(&context).cloned()
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.saved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ContextId {
        ContextId(n)
    }

    #[test]
    fn test_nested_same_context_restores_outer() {
        let mut stack = ContextStack::default();
        stack.push(id(0), Rc::new(1u32));
        stack.push(id(0), Rc::new(2u32));

        assert_eq!(stack.read(id(0)).unwrap().downcast_ref::<u32>(), Some(&2));

        stack.pop(id(0));
        assert_eq!(stack.read(id(0)).unwrap().downcast_ref::<u32>(), Some(&1));

        stack.pop(id(0));
        assert!(stack.read(id(0)).is_none());
    }

    #[test]
    fn test_independent_contexts() {
        let mut stack = ContextStack::default();
        stack.push(id(0), Rc::new("a"));
        stack.push(id(1), Rc::new("b"));

        assert!(stack.read(id(0)).is_some());
        assert!(stack.read(id(1)).is_some());

        stack.pop(id(1));
        assert!(stack.read(id(0)).is_some());
        assert!(stack.read(id(1)).is_none());
    }
}
