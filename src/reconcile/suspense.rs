//! Suspense boundaries and async dependencies.
//!
//! An [`AsyncValue`] is the one-shot cell a component reads with
//! [`crate::hooks::HookCtx::use_async`]. Reading a pending cell does not
//! unwind the stack with a panic; it returns [`crate::error::Unwind::Suspended`],
//! which the work loop routes to the nearest boundary on the handler stack.
//! Resolving the cell pings every lane that suspended on it, re-marking the
//! root so the original render retries.
//!
//! The handler stack is owned by the work loop (pushed in the begin phase,
//! popped on completion and during unwind) — boundary discovery is an
//! explicit stack walk, not ambient lookup.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::arena::UnitId;
use crate::engine::lanes::Lanes;
use crate::engine::update_queue::StateValue;
use crate::shared::{ScheduleRequest, SharedHandle};

// =============================================================================
// Async cells
// =============================================================================

enum AsyncState {
    Pending,
    Ready(StateValue),
}

/// Untyped core of an [`AsyncValue`]; what the suspend signal carries.
pub struct AsyncCell {
    state: RefCell<AsyncState>,
    /// Ping listeners: one entry per (mailbox, lane) waiting on this cell.
    pings: RefCell<Vec<(SharedHandle, Lanes)>>,
}

impl AsyncCell {
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), AsyncState::Ready(_))
    }

    pub(crate) fn value(&self) -> Option<StateValue> {
        match &*self.state.borrow() {
            AsyncState::Ready(value) => Some(value.clone()),
            AsyncState::Pending => None,
        }
    }

    /// Register a retry ping for `lane`. At most one listener per lane per
    /// cell: a render retried for the same lane does not stack pings.
    pub(crate) fn attach_ping(&self, shared: &SharedHandle, lane: Lanes) {
        let mut pings = self.pings.borrow_mut();
        if pings.iter().any(|(_, registered)| registered.contains(lane)) {
            return;
        }
        log::trace!("suspense: ping listener attached for {lane:?}");
        pings.push((shared.clone(), lane));
    }

    fn resolve(&self, value: StateValue) {
        {
            let mut state = self.state.borrow_mut();
            if matches!(*state, AsyncState::Ready(_)) {
                return;
            }
            *state = AsyncState::Ready(value);
        }
        for (shared, lane) in self.pings.borrow_mut().drain(..) {
            log::debug!("suspense: resolved, pinging {lane:?}");
            shared
                .borrow_mut()
                .requests
                .push(ScheduleRequest { unit: None, lane });
        }
    }
}

/// A value that may not exist yet.
///
/// Components read it through `use_async`; while pending, the nearest
/// suspense boundary shows its fallback. Resolution reschedules the lanes
/// that were waiting. Clones share the underlying cell.
pub struct AsyncValue<T> {
    cell: Rc<AsyncCell>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for AsyncValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> AsyncValue<T> {
    pub fn pending() -> Self {
        Self {
            cell: Rc::new(AsyncCell {
                state: RefCell::new(AsyncState::Pending),
                pings: RefCell::new(Vec::new()),
            }),
            _marker: PhantomData,
        }
    }

    /// An already-resolved value (reads never suspend).
    pub fn ready(value: T) -> Self {
        let av = Self::pending();
        av.cell.resolve(Rc::new(value));
        av
    }

    /// Publish the value. Idempotent: later calls are ignored.
    pub fn resolve(&self, value: T) {
        self.cell.resolve(Rc::new(value));
    }

    pub fn is_ready(&self) -> bool {
        self.cell.is_ready()
    }

    pub(crate) fn cell(&self) -> &Rc<AsyncCell> {
        &self.cell
    }
}

// =============================================================================
// Boundary stack
// =============================================================================

/// Suspense boundaries enclosing the unit currently being rendered,
/// innermost last.
#[derive(Default)]
pub struct SuspenseStack {
    handlers: Vec<UnitId>,
}

impl SuspenseStack {
    pub fn push(&mut self, boundary: UnitId) {
        self.handlers.push(boundary);
    }

    pub fn pop(&mut self) -> Option<UnitId> {
        self.handlers.pop()
    }

    /// The nearest enclosing boundary, if any.
    pub fn current(&self) -> Option<UnitId> {
        self.handlers.last().copied()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
