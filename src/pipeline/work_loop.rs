//! Work loop and scheduler bridge.
//!
//! One mutable cursor (`wip`) drives the begin/complete alternation. The
//! scheduling policy around it: every externally observed mutation merges
//! its lane into the root and re-runs the decision — sync lane work goes to
//! the microtask-flushed sync queue, anything else becomes a scheduler
//! callback at the translated priority, cancelling a callback that a
//! higher-priority request superseded and coalescing identical consecutive
//! requests. A fresh work-in-progress stack is prepared only when the
//! render lane changes, so a time-sliced render resumes from the exact unit
//! it yielded at. After every yield and after every commit the decision is
//! made again from scratch.

use std::rc::Rc;

use crate::engine::arena::UnitId;
use crate::engine::lanes::{lanes_to_scheduler_priority, Lanes};
use crate::engine::unit::{create_work_in_progress, UnitProps};
use crate::error::{ReconcileError, Unwind};
use crate::host::HostAdapter;
use crate::reconcile::begin::begin_work;
use crate::reconcile::complete::complete_work;
use crate::reconcile::suspense::AsyncCell;
use crate::reconcile::unwind::throw_and_unwind;
use crate::reconcile::WorkContext;
use crate::root::Root;
use crate::scheduler::TaskScheduler;

/// Mutable state of the render state machine: Idle (no `wip`, empty lane),
/// Rendering, Suspended (`suspended` set), or Interrupted (`wip` set while
/// control is outside the loop).
pub(crate) struct WorkLoopState {
    pub wip: Option<UnitId>,
    pub render_lane: Lanes,
    pub suspended: Option<Rc<AsyncCell>>,
    pub ctx: WorkContext,
}

impl Default for WorkLoopState {
    fn default() -> Self {
        Self {
            wip: None,
            render_lane: Lanes::empty(),
            suspended: None,
            ctx: WorkContext::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitStatus {
    /// Yielded with work remaining; a continuation is scheduled.
    InComplete,
    Completed,
}

impl<H: HostAdapter, S: TaskScheduler> Root<H, S> {
    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Turn mailbox requests (setters, pings, renders) into lane marks and
    /// re-run the scheduling decision.
    pub(crate) fn drain_mailbox(&mut self) {
        loop {
            let requests = std::mem::take(&mut self.shared.borrow_mut().requests);
            if requests.is_empty() {
                break;
            }
            for request in requests {
                if let Some(unit) = request.unit {
                    if self.arena.contains(unit) {
                        self.arena[unit].lanes |= request.lane;
                        if let Some(alternate) = self.arena[unit].alternate {
                            self.arena[alternate].lanes |= request.lane;
                        }
                    }
                }
                self.graph.pending_lanes |= request.lane;
                log::debug!("update recorded at {:?}", request.lane);
            }
            self.ensure_scheduled();
        }
    }

    /// The scheduling decision: look at the highest pending lane and make
    /// exactly one callback (or sync flush) outstanding for it.
    pub(crate) fn ensure_scheduled(&mut self) {
        let lane = self.graph.pending_lanes.highest_priority();

        if lane.is_empty() {
            if let Some(token) = self.graph.callback_token.take() {
                self.scheduler.cancel_callback(token);
            }
            self.graph.callback_priority = Lanes::empty();
            return;
        }

        let prev = self.graph.callback_priority;
        if lane == prev {
            // Identical consecutive requests coalesce — except a sync lane
            // whose queued flush was already consumed.
            if lane != Lanes::SYNC || self.sync_queue.is_scheduled() {
                return;
            }
        }

        if let Some(token) = self.graph.callback_token.take() {
            self.scheduler.cancel_callback(token);
        }

        if lane == Lanes::SYNC {
            log::debug!("scheduling sync flush at microtask timing");
            self.sync_queue.schedule();
            self.scheduler.request_microtask();
        } else {
            let priority = lanes_to_scheduler_priority(lane);
            log::debug!("scheduling callback for {lane:?} at {priority:?}");
            self.graph.callback_token = Some(self.scheduler.request_callback(priority));
        }
        self.graph.callback_priority = lane;
    }

    pub(crate) fn flush_sync_callbacks(&mut self) -> Result<(), ReconcileError> {
        if self.sync_queue.flushing {
            return Ok(());
        }
        self.sync_queue.flushing = true;
        let mut result = Ok(());
        while self.sync_queue.take_scheduled() {
            if let Err(err) = self.perform_sync_work() {
                result = Err(err);
                break;
            }
        }
        self.sync_queue.flushing = false;
        result
    }

    // =========================================================================
    // Entry points per mode
    // =========================================================================

    pub(crate) fn perform_sync_work(&mut self) -> Result<(), ReconcileError> {
        let lane = self.graph.pending_lanes.highest_priority();
        if lane != Lanes::SYNC {
            // Stale flush; put the decision back in charge.
            self.ensure_scheduled();
            return Ok(());
        }

        match self.render_root(Lanes::SYNC, false)? {
            ExitStatus::Completed => {
                self.finish_render(Lanes::SYNC);
                self.commit_root();
                Ok(())
            }
            ExitStatus::InComplete => unreachable!("sync render yielded"),
        }
    }

    pub(crate) fn perform_concurrent_work(
        &mut self,
        did_timeout: bool,
    ) -> Result<(), ReconcileError> {
        // Passive effects from the previous commit run before new render
        // work; their own updates may change what is worth rendering.
        self.flush_passive_effects()?;

        let lane = self.graph.pending_lanes.highest_priority();
        if lane.is_empty() {
            return Ok(());
        }
        let need_sync = lane == Lanes::SYNC || did_timeout;
        let status = self.render_root(lane, !need_sync)?;

        // Remaining or interrupted work gets its continuation here; after a
        // commit the decision below coalesces with this one.
        self.ensure_scheduled();

        match status {
            ExitStatus::InComplete => Ok(()),
            ExitStatus::Completed => {
                self.finish_render(lane);
                self.commit_root();
                Ok(())
            }
        }
    }

    fn finish_render(&mut self, lane: Lanes) {
        self.graph.finished_work = self.arena[self.graph.root_unit].alternate;
        self.graph.finished_lane = lane;
        self.work.render_lane = Lanes::empty();
    }

    // =========================================================================
    // Render driver
    // =========================================================================

    fn prepare_fresh_stack(&mut self, lane: Lanes) {
        self.sweep_abandoned();
        self.graph.finished_lane = Lanes::empty();
        self.graph.finished_work = None;
        self.work.ctx.reset();
        self.work.suspended = None;
        let wip = create_work_in_progress(&mut self.arena, self.graph.root_unit, UnitProps::None);
        self.work.wip = Some(wip);
        self.work.render_lane = lane;
    }

    /// Reclaim units allocated by a render pass that never committed. Pair
    /// slots survive (they are owned by their committed alternates); only
    /// unpaired fresh units are garbage.
    fn sweep_abandoned(&mut self) {
        for id in self.arena.take_pass_log() {
            if self.arena.contains(id) && self.arena[id].alternate.is_none() {
                log::trace!("reclaiming abandoned unit {id}");
                self.arena.free(id);
            }
        }
    }

    pub(crate) fn render_root(
        &mut self,
        lane: Lanes,
        time_sliced: bool,
    ) -> Result<ExitStatus, ReconcileError> {
        log::debug!(
            "render start at {lane:?} ({})",
            if time_sliced { "time-sliced" } else { "sync" }
        );

        // Same lane resumes in place; anything else starts over.
        if self.work.render_lane != lane {
            self.prepare_fresh_stack(lane);
        }

        loop {
            if let Some(cell) = self.work.suspended.take() {
                let Some(wip) = self.work.wip else { break };
                match throw_and_unwind(
                    &mut self.arena,
                    &mut self.work.ctx,
                    &self.shared,
                    wip,
                    cell,
                    lane,
                ) {
                    Some(boundary) => self.work.wip = Some(boundary),
                    None => {
                        self.abort_render();
                        return Err(ReconcileError::UnhandledSuspension);
                    }
                }
            }

            match self.work_loop(time_sliced) {
                Ok(()) => break,
                Err(Unwind::Suspended(cell)) => self.work.suspended = Some(cell),
                Err(Unwind::Fatal(err)) => {
                    self.abort_render();
                    return Err(err);
                }
            }
        }

        if time_sliced && self.work.wip.is_some() {
            return Ok(ExitStatus::InComplete);
        }
        debug_assert!(self.work.wip.is_none(), "sync render left work behind");
        Ok(ExitStatus::Completed)
    }

    fn abort_render(&mut self) {
        self.work.wip = None;
        self.work.render_lane = Lanes::empty();
        self.work.suspended = None;
        self.work.ctx.reset();
    }

    /// Begin/complete alternation; the yield predicate is consulted once
    /// per unit in time-sliced mode.
    fn work_loop(&mut self, time_sliced: bool) -> Result<(), Unwind> {
        while let Some(unit) = self.work.wip {
            if time_sliced && self.scheduler.should_yield() {
                log::trace!("yielding before {unit}");
                break;
            }
            self.perform_unit(unit)?;
        }
        Ok(())
    }

    fn perform_unit(&mut self, unit: UnitId) -> Result<(), Unwind> {
        let next = begin_work(
            &mut self.arena,
            &mut self.work.ctx,
            &self.shared,
            unit,
            self.work.render_lane,
        )?;

        // Props proposed for this pass are now the rendered ones.
        let props = self.arena[unit].pending_props.clone();
        self.arena[unit].committed_props = Some(props);

        match next {
            Some(child) => self.work.wip = Some(child),
            None => self.complete_unit(unit),
        }
        Ok(())
    }

    /// Climb completing units until a sibling offers more begin work.
    fn complete_unit(&mut self, unit: UnitId) {
        let mut node = Some(unit);
        while let Some(id) = node {
            complete_work(&mut self.arena, &mut self.work.ctx, &mut self.host, id);
            if let Some(sibling) = self.arena[id].sibling {
                self.work.wip = Some(sibling);
                return;
            }
            node = self.arena[id].parent;
            self.work.wip = node;
        }
    }
}
