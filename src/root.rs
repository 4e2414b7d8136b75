//! Root: the public entry point binding one host container to one
//! reconciliation tree.
//!
//! A root owns everything for its mount target: the unit arena, the host
//! adapter, the scheduler bridge, the work-loop state, and the shared
//! mailbox that setters and async pings post into. Rendering is two-step by
//! design — [`Root::render`] only enqueues and schedules; [`Root::flush`]
//! (or an embedding's own pump over [`Root::run_task`]) performs the
//! scheduled work. That split is what makes batching, priorities, and
//! time-slicing observable instead of incidental.
//!
//! # Example
//!
//! ```ignore
//! use weft::{host, text, props, MemoryHost, Root};
//!
//! let mut root = Root::new(MemoryHost::new());
//! root.render(host("div", props! {}, vec![text("hello")]));
//! root.flush()?;
//! assert_eq!(root.host().text_content(), "hello");
//! ```

use std::rc::Rc;

use crate::element::Element;
use crate::engine::arena::Arena;
use crate::engine::lanes::Lanes;
use crate::engine::unit::{Unit, UnitGraph, UnitKind, UnitProps};
use crate::engine::update_queue::{new_shared_queue, Action, Update};
use crate::error::ReconcileError;
use crate::host::HostAdapter;
use crate::pipeline::work_loop::WorkLoopState;
use crate::pipeline::sync_queue::SyncQueue;
use crate::scheduler::{ManualScheduler, ScheduledTask, SchedulerPriority, TaskScheduler};
use crate::shared::{new_shared, request_update_lane, ScheduleRequest, SharedHandle};

pub struct Root<H: HostAdapter, S: TaskScheduler = ManualScheduler> {
    pub(crate) arena: Arena,
    pub(crate) host: H,
    pub(crate) scheduler: S,
    pub(crate) graph: UnitGraph,
    pub(crate) work: WorkLoopState,
    pub(crate) shared: SharedHandle,
    pub(crate) sync_queue: SyncQueue,
}

impl<H: HostAdapter> Root<H> {
    /// Create a root over `host` with the bundled deterministic scheduler.
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, ManualScheduler::new())
    }
}

impl<H: HostAdapter, S: TaskScheduler> Root<H, S> {
    pub fn with_scheduler(host: H, scheduler: S) -> Self {
        let mut arena = Arena::new();
        let mut root_unit = Unit::new(UnitKind::HostRoot, UnitProps::None, None);
        root_unit.update_queue = Some(new_shared_queue());
        root_unit.base_state = Some(Rc::new(Element::Empty));
        let root_unit = arena.insert(root_unit);
        // The root unit predates any render pass; it is never pass garbage.
        arena.take_pass_log();

        Self {
            arena,
            host,
            scheduler,
            graph: UnitGraph::new(root_unit),
            work: WorkLoopState::default(),
            shared: new_shared(),
            sync_queue: SyncQueue::default(),
        }
    }

    /// Enqueue a new top-level element and request scheduling. Work is
    /// performed later, by [`Root::flush`] or the embedding's task pump.
    ///
    /// Outside any priority scope this renders at the synchronous lane;
    /// inside [`Root::run_with_priority`] or a transition it takes the
    /// scope's lane.
    pub fn render(&mut self, element: Element) {
        let lane = {
            let shared = self.shared.borrow();
            if shared.in_transition || shared.ambient_priority.is_some() {
                drop(shared);
                request_update_lane(&self.shared)
            } else {
                Lanes::SYNC
            }
        };

        let root_unit = self.graph.root_unit;
        let queue = self.arena[root_unit]
            .update_queue
            .clone()
            .expect("root without update queue");
        queue.borrow_mut().enqueue(Update {
            action: Action::Replace(Rc::new(element)),
            lane,
        });
        self.shared.borrow_mut().requests.push(ScheduleRequest {
            unit: Some(root_unit),
            lane,
        });
        self.drain_mailbox();
    }

    /// Run `f` with an ambient scheduler priority, the way an input-event
    /// dispatch layer would. State setters invoked inside derive their lane
    /// from it. Requests are scheduled on exit but not flushed, so several
    /// dispatches batch.
    pub fn run_with_priority<R>(&mut self, priority: SchedulerPriority, f: impl FnOnce() -> R) -> R {
        let prev = self.shared.borrow_mut().ambient_priority.replace(priority);
        let out = f();
        self.shared.borrow_mut().ambient_priority = prev;
        self.drain_mailbox();
        out
    }

    /// Execute one scheduled callback previously requested through the
    /// scheduler. Embeddings with their own event loop call this when the
    /// host-side callback fires; tokens that were superseded are ignored.
    pub fn run_task(&mut self, task: ScheduledTask) -> Result<(), ReconcileError> {
        self.drain_mailbox();

        if Some(task.token) == self.graph.passive_token {
            self.graph.passive_token = None;
            return self.with_ambient(SchedulerPriority::Normal, |root| {
                root.flush_passive_effects().map(|_| ())
            });
        }
        if Some(task.token) == self.graph.callback_token {
            self.graph.callback_token = None;
            self.graph.callback_priority = Lanes::empty();
            return self.with_ambient(task.priority, |root| root.perform_concurrent_work(false));
        }
        log::trace!("stale callback {} ignored", task.token);
        Ok(())
    }

    /// Flush batched synchronous work now (microtask timing in a real
    /// embedding).
    pub fn flush_sync(&mut self) -> Result<(), ReconcileError> {
        self.drain_mailbox();
        self.with_ambient(SchedulerPriority::Immediate, |root| {
            root.flush_sync_callbacks()
        })
    }

    pub(crate) fn with_ambient<R>(
        &mut self,
        priority: SchedulerPriority,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let prev = self.shared.borrow_mut().ambient_priority.replace(priority);
        let out = f(self);
        self.shared.borrow_mut().ambient_priority = prev;
        out
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<H: HostAdapter> Root<H, ManualScheduler> {
    /// Drive all scheduled work to quiescence: microtask flushes, render
    /// callbacks, passive effects, and whatever they schedule in turn.
    pub fn flush(&mut self) -> Result<(), ReconcileError> {
        while self.step()? {}
        Ok(())
    }

    /// Run the single next piece of scheduled work. Returns whether
    /// anything ran — `false` means idle.
    pub fn step(&mut self) -> Result<bool, ReconcileError> {
        self.drain_mailbox();

        if self.scheduler.take_microtask_request() {
            self.with_ambient(SchedulerPriority::Immediate, |root| {
                root.flush_sync_callbacks()
            })?;
            return Ok(true);
        }
        if let Some(task) = self.scheduler.take_next_task() {
            self.run_task(task)?;
            return Ok(true);
        }
        Ok(false)
    }
}
