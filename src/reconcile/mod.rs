//! Reconciliation: the top-down begin phase (diffing, child matching), the
//! bottom-up completion phase (host instance construction, flag bubbling),
//! and the unwind walk for suspended renders.

pub mod begin;
pub mod children;
pub mod complete;
pub mod context;
pub mod suspense;
pub mod unwind;

pub use suspense::AsyncValue;

use context::ContextStack;
use suspense::SuspenseStack;

/// Traversal-scoped stacks owned by the work loop: provider values and
/// suspense handlers for the path from the root to the unit being rendered.
/// Pushed by the begin phase, popped by completion and by the unwind walk.
#[derive(Default)]
pub struct WorkContext {
    pub contexts: ContextStack,
    pub suspense: SuspenseStack,
}

impl WorkContext {
    /// Drop whatever a discarded render left on the stacks.
    pub fn reset(&mut self) {
        self.contexts.clear();
        self.suspense.clear();
    }
}
