//! Error taxonomy.
//!
//! Usage errors are fatal and surface synchronously through `Result`.
//! Suspension is not an error: it travels as [`Unwind::Suspended`], a
//! control-flow signal the work loop converts into a fallback render at the
//! nearest suspense boundary. Only a suspension with no enclosing boundary
//! becomes a real error.

use std::rc::Rc;

use crate::reconcile::suspense::AsyncCell;

/// Fatal errors surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A component rendered a different number of hooks than it did on the
    /// previous pass (a hook call was made conditional).
    #[error("hook count changed between renders: expected {expected}, component requested hook #{found}")]
    HookCountMismatch { expected: usize, found: usize },

    /// A hook at a given position changed kind between renders (for example
    /// a state hook where an effect hook used to be).
    #[error("hook order changed between renders at slot {index}: expected {expected}, found {found}")]
    HookOrderMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A state hook holds a value of a different type than the one now
    /// requested at its position.
    #[error("state hook at slot {index} changed value type between renders")]
    HookTypeMismatch { index: usize },

    /// An async dependency suspended with no suspense boundary above it.
    #[error("async dependency suspended with no enclosing suspense boundary")]
    UnhandledSuspension,
}

/// Signal propagated up the begin phase instead of a rendered element.
///
/// `Suspended` carries the pending async cell so the work loop can register
/// a ping listener before unwinding to the nearest boundary.
pub enum Unwind {
    Suspended(Rc<AsyncCell>),
    Fatal(ReconcileError),
}

impl From<ReconcileError> for Unwind {
    fn from(err: ReconcileError) -> Self {
        Unwind::Fatal(err)
    }
}

impl std::fmt::Debug for Unwind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unwind::Suspended(_) => f.write_str("Unwind::Suspended"),
            Unwind::Fatal(err) => write!(f, "Unwind::Fatal({err:?})"),
        }
    }
}
