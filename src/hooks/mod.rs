//! Hook and effect state for function components.
//!
//! A component's hooks live as positional records on its unit. The same
//! public call resolves to mount or update behavior through the mode the
//! [`HookCtx`] was built with — a capability object handed to the component
//! function, not ambient global state — selected by whether the unit has a
//! paired previous generation. Update-mode hooks match the previous
//! generation's records strictly by position; a count or kind mismatch is a
//! fatal usage error, never silently tolerated.
//!
//! State setters are plain cloneable handles. Dispatching one derives a
//! lane (transition marker or ambient scheduler priority), enqueues onto
//! the slot's shared queue, and drops a schedule request into the root's
//! mailbox.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::element::{Context, Element};
use crate::engine::arena::{Arena, UnitId};
use crate::engine::lanes::Lanes;
use crate::engine::unit::{ElementType, UnitProps};
use crate::engine::update_queue::{
    new_shared_queue, process_updates, Action, SharedQueue, StateValue, Update,
};
use crate::engine::EffectFlags;
use crate::error::{ReconcileError, Unwind};
use crate::reconcile::context::ContextStack;
use crate::reconcile::suspense::AsyncValue;
use crate::shared::{request_update_lane, ScheduleRequest, SharedHandle};
use crate::types::Value;

/// Teardown returned by an effect setup.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Hook records
// =============================================================================

#[derive(Clone)]
pub struct Hook {
    pub state: HookState,
}

#[derive(Clone)]
pub enum HookState {
    State(StateHook),
    Effect(EffectHook),
    Transition(TransitionHook),
}

fn kind_name(state: &HookState) -> &'static str {
    match state {
        HookState::State(_) => "state",
        HookState::Effect(_) => "effect",
        HookState::Transition(_) => "transition",
    }
}

#[derive(Clone)]
pub struct StateHook {
    pub memoized: StateValue,
    pub queue: SharedQueue,
    pub base_state: StateValue,
    pub base_updates: Vec<Update>,
}

/// One effect record. The cleanup cell is shared between generations so an
/// unexecuted teardown carries forward when deps are unchanged.
#[derive(Clone)]
pub struct EffectHook {
    pub setup: Rc<dyn Fn() -> Option<Cleanup>>,
    pub cleanup: Rc<std::cell::RefCell<Option<Cleanup>>>,
    pub deps: Option<Vec<Value>>,
    /// Deps changed (or are absent): setup must run after this commit.
    pub has_pending: bool,
}

#[derive(Clone)]
pub struct TransitionHook {
    handle: Transition,
}

// =============================================================================
// Setters and transitions
// =============================================================================

/// Handle that enqueues a new value (or reducer) for one state slot and
/// requests a render. Usable from anywhere; clones address the same slot.
pub struct Setter<T> {
    unit: UnitId,
    queue: SharedQueue,
    shared: SharedHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit,
            queue: self.queue.clone(),
            shared: self.shared.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(Rc::new(value)));
    }

    /// Enqueue a pure function of the previous value. Functions compose
    /// across renders: every queued update sees its predecessor's result.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(Action::Apply(Rc::new(move |prev: &StateValue| {
            let prev = prev
                .downcast_ref::<T>()
                .expect("state value changed type under a queued update");
            Rc::new(f(prev)) as StateValue
        })));
    }

    fn dispatch(&self, action: Action) {
        let lane = request_update_lane(&self.shared);
        self.queue.borrow_mut().enqueue(Update { action, lane });
        self.shared.borrow_mut().requests.push(ScheduleRequest {
            unit: Some(self.unit),
            lane,
        });
        log::trace!("setter: enqueued update on {} at {lane:?}", self.unit);
    }
}

/// Handle returned by [`HookCtx::use_transition`].
#[derive(Clone)]
pub struct Transition {
    pending: Setter<bool>,
    shared: SharedHandle,
}

impl Transition {
    /// Run `scope` with the transition marker set: state updates dispatched
    /// inside take the transition lane instead of the ambient priority.
    pub fn start(&self, scope: impl FnOnce()) {
        self.pending.set(true);
        let prev = {
            let mut shared = self.shared.borrow_mut();
            std::mem::replace(&mut shared.in_transition, true)
        };
        // Cleared at the deferred priority, so is_pending flips back only
        // when the transition itself commits.
        self.pending.set(false);
        scope();
        self.shared.borrow_mut().in_transition = prev;
    }
}

// =============================================================================
// Hook context
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum HookMode {
    Mount,
    Update,
}

/// The capability object a component function renders under.
///
/// Exactly one exists at a time (single-threaded reentrancy: component
/// renders never nest).
pub struct HookCtx<'a> {
    unit: UnitId,
    render_lane: Lanes,
    mode: HookMode,
    prev: Vec<Hook>,
    cursor: usize,
    next: Vec<Hook>,
    passive_flagged: bool,
    remaining_lanes: Lanes,
    /// Pending updates drained from shared queues this pass, by slot. They
    /// are re-recorded on the committed generation's base queue so nothing
    /// is lost if this render is thrown away for a different lane.
    drained: Vec<(usize, Vec<Update>)>,
    shared: SharedHandle,
    contexts: &'a ContextStack,
}

impl<'a> HookCtx<'a> {
    fn take_slot(&mut self) -> Result<Option<Hook>, Unwind> {
        match self.mode {
            HookMode::Mount => Ok(None),
            HookMode::Update => {
                let index = self.cursor;
                if index >= self.prev.len() {
                    return Err(ReconcileError::HookCountMismatch {
                        expected: self.prev.len(),
                        found: index + 1,
                    }
                    .into());
                }
                Ok(Some(self.prev[index].clone()))
            }
        }
    }

    fn finish_slot(&mut self, hook: Hook) {
        self.next.push(hook);
        self.cursor += 1;
    }

    /// A state slot. `init` runs only on mount.
    pub fn use_state<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<(Rc<T>, Setter<T>), Unwind> {
        let index = self.cursor;
        let state = match self.take_slot()? {
            None => {
                let memoized: StateValue = Rc::new(init());
                StateHook {
                    memoized: memoized.clone(),
                    queue: new_shared_queue(),
                    base_state: memoized,
                    base_updates: Vec::new(),
                }
            }
            Some(prev) => {
                let HookState::State(prev_state) = &prev.state else {
                    return Err(ReconcileError::HookOrderMismatch {
                        index,
                        expected: kind_name(&prev.state),
                        found: "state",
                    }
                    .into());
                };

                let pending = prev_state.queue.borrow_mut().take_pending();
                if !pending.is_empty() {
                    self.drained.push((index, pending.clone()));
                }
                let mut updates = prev_state.base_updates.clone();
                updates.extend(pending);
                for update in &updates {
                    if !update.lane.is_satisfied_by(self.render_lane) {
                        self.remaining_lanes |= update.lane;
                    }
                }

                let processed =
                    process_updates(prev_state.base_state.clone(), updates, self.render_lane);
                StateHook {
                    memoized: processed.memoized,
                    queue: prev_state.queue.clone(),
                    base_state: processed.base_state,
                    base_updates: processed.base_updates,
                }
            }
        };

        let value = state
            .memoized
            .clone()
            .downcast::<T>()
            .map_err(|_| ReconcileError::HookTypeMismatch { index })?;
        let setter = Setter {
            unit: self.unit,
            queue: state.queue.clone(),
            shared: self.shared.clone(),
            _marker: PhantomData,
        };

        self.finish_slot(Hook {
            state: HookState::State(state),
        });
        Ok((value, setter))
    }

    /// A passive effect. `deps` of `None` means run after every commit;
    /// otherwise setup runs only when the deps differ shallowly from the
    /// previous render, and the previous cleanup carries forward unexecuted
    /// when they do not.
    pub fn use_effect(
        &mut self,
        deps: Option<Vec<Value>>,
        setup: impl Fn() -> Option<Cleanup> + 'static,
    ) -> Result<(), Unwind> {
        let index = self.cursor;
        let effect = match self.take_slot()? {
            None => EffectHook {
                setup: Rc::new(setup),
                cleanup: Rc::new(std::cell::RefCell::new(None)),
                deps,
                has_pending: true,
            },
            Some(prev) => {
                let HookState::Effect(prev_effect) = &prev.state else {
                    return Err(ReconcileError::HookOrderMismatch {
                        index,
                        expected: kind_name(&prev.state),
                        found: "effect",
                    }
                    .into());
                };

                let changed = match (&prev_effect.deps, &deps) {
                    (Some(old), Some(new)) => old != new,
                    _ => true,
                };
                EffectHook {
                    setup: Rc::new(setup),
                    cleanup: prev_effect.cleanup.clone(),
                    deps,
                    has_pending: changed,
                }
            }
        };

        if effect.has_pending {
            self.passive_flagged = true;
        }
        self.finish_slot(Hook {
            state: HookState::Effect(effect),
        });
        Ok(())
    }

    /// A transition scope plus its `is_pending` signal.
    pub fn use_transition(&mut self) -> Result<(bool, Transition), Unwind> {
        let (pending, setter) = self.use_state(|| false)?;

        let index = self.cursor;
        let handle = match self.take_slot()? {
            None => Transition {
                pending: setter,
                shared: self.shared.clone(),
            },
            Some(prev) => {
                let HookState::Transition(prev_transition) = &prev.state else {
                    return Err(ReconcileError::HookOrderMismatch {
                        index,
                        expected: kind_name(&prev.state),
                        found: "transition",
                    }
                    .into());
                };
                prev_transition.handle.clone()
            }
        };

        self.finish_slot(Hook {
            state: HookState::Transition(TransitionHook {
                handle: handle.clone(),
            }),
        });
        Ok((*pending, handle))
    }

    /// Read the nearest enclosing provider's value for `context`, or `None`
    /// when no provider is above this unit. Takes no hook slot.
    pub fn use_context<T: 'static>(&self, context: &Context<T>) -> Option<Rc<T>> {
        self.contexts
            .read(context.id())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Read an async value, suspending to the nearest boundary while it is
    /// pending. Takes no hook slot.
    pub fn use_async<T: 'static>(&self, value: &AsyncValue<T>) -> Result<Rc<T>, Unwind> {
        match value.cell().value() {
            Some(ready) => ready
                .downcast::<T>()
                .map_err(|_| Unwind::Fatal(ReconcileError::HookTypeMismatch { index: self.cursor })),
            None => Err(Unwind::Suspended(value.cell().clone())),
        }
    }
}

// =============================================================================
// Render driver
// =============================================================================

/// Invoke a function unit's component under a fresh hook context and
/// install the resulting hook records on the unit.
///
/// On unwind (suspension or usage error) the scratch records are discarded;
/// the committed generation stays untouched, so a retried render starts
/// clean.
pub(crate) fn render_with_hooks(
    arena: &mut Arena,
    contexts: &ContextStack,
    shared: &SharedHandle,
    wip: UnitId,
    render_lane: Lanes,
) -> Result<Element, Unwind> {
    let component = match &arena[wip].element_type {
        Some(ElementType::Component(def)) => def.clone(),
        other => unreachable!("render_with_hooks on non-component unit: {other:?}"),
    };
    let props = match &arena[wip].pending_props {
        UnitProps::Component(props) => props.clone(),
        other => unreachable!("function unit with non-component props: {other:?}"),
    };

    let prev = arena[wip]
        .alternate
        .map(|alt| arena[alt].hooks.clone());
    let mode = if prev.is_some() {
        HookMode::Update
    } else {
        HookMode::Mount
    };

    let mut ctx = HookCtx {
        unit: wip,
        render_lane,
        mode,
        prev: prev.unwrap_or_default(),
        cursor: 0,
        next: Vec::new(),
        passive_flagged: false,
        remaining_lanes: Lanes::empty(),
        drained: Vec::new(),
        shared: shared.clone(),
        contexts,
    };

    let result = component.call(&mut ctx, &props);

    // Re-record drained pending updates on the committed side before this
    // pass can be discarded; a fresh stack for another lane clones from
    // there, so nothing enqueued is lost to an abandoned render.
    let drained = std::mem::take(&mut ctx.drained);
    if !drained.is_empty() {
        if let Some(current) = arena[wip].alternate {
            for (index, pending) in drained {
                if let Some(Hook {
                    state: HookState::State(slot),
                }) = arena[current].hooks.get_mut(index)
                {
                    slot.base_updates.extend(pending);
                }
            }
        }
    }

    let children = result?;

    if ctx.mode == HookMode::Update && ctx.cursor != ctx.prev.len() {
        return Err(ReconcileError::HookCountMismatch {
            expected: ctx.prev.len(),
            found: ctx.cursor,
        }
        .into());
    }

    let HookCtx {
        next,
        passive_flagged,
        remaining_lanes,
        ..
    } = ctx;

    let unit = &mut arena[wip];
    unit.hooks = next;
    unit.lanes = remaining_lanes;
    if passive_flagged {
        unit.flags |= EffectFlags::PASSIVE;
    }
    Ok(children)
}
