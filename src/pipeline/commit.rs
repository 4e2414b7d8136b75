//! Commit engine: apply a finished render to the host tree.
//!
//! Three ordered sub-phases, each a flag-guided depth-first walk that only
//! descends where `subtree_flags` intersect the phase mask:
//!
//! 1. **Mutation** — placements (host parent + stable host sibling
//!    discovery), content/prop updates, recursive deletions (unmount
//!    teardowns are salvaged *before* structural detach, because the units
//!    are unreachable afterward), visibility flips, and collection of
//!    passive work into the root's queues.
//! 2. **Tree publish** — the root's visible pointer swaps to the finished
//!    tree, between mutation and layout: ref detaches above see the old
//!    tree, ref attaches below see mutated host instances.
//! 3. **Layout** — ref bindings attach now that instances are live.
//!
//! Passive effects never run inline; they are a separate normal-priority
//! task so their own state updates go through ordinary scheduling.

use crate::engine::arena::UnitId;
use crate::engine::flags::EffectFlags;
use crate::engine::lanes::Lanes;
use crate::engine::unit::{OffscreenMode, UnitKind, UnitProps};
use crate::error::ReconcileError;
use crate::hooks::{EffectHook, HookState};
use crate::host::{HostAdapter, HostHandle, HostParent};
use crate::root::Root;
use crate::scheduler::{SchedulerPriority, TaskScheduler};

impl<H: HostAdapter, S: TaskScheduler> Root<H, S> {
    // =========================================================================
    // Commit driver
    // =========================================================================

    pub(crate) fn commit_root(&mut self) {
        let Some(finished) = self.graph.finished_work.take() else {
            return;
        };
        let lane = self.graph.finished_lane;
        if lane.is_empty() {
            log::warn!("commit without a finished lane");
        }
        self.graph.finished_lane = Lanes::empty();
        self.graph.pending_lanes -= lane;
        log::debug!("commit start for {lane:?}");

        self.sweep_unreachable(finished);

        let flags = self.arena[finished].flags | self.arena[finished].subtree_flags;

        if flags.intersects(EffectFlags::PASSIVE_MASK) && !self.graph.passive_scheduled {
            self.graph.passive_scheduled = true;
            if self.graph.passive_token.is_none() {
                self.graph.passive_token =
                    Some(self.scheduler.request_callback(SchedulerPriority::Normal));
            }
        }

        if flags.intersects(EffectFlags::MUTATION_MASK | EffectFlags::PASSIVE_MASK) {
            self.commit_mutation_effects(finished);
            // Tree publish: current and work-in-progress exchange roles.
            self.graph.root_unit = finished;
            self.commit_layout_effects(finished);
        } else {
            self.graph.root_unit = finished;
        }

        self.graph.passive_scheduled = false;
        self.ensure_scheduled();
    }

    /// Reclaim units this pass allocated but did not link into the
    /// finished tree (a suspense retry, for example, abandons the first
    /// primary attempt within the same pass).
    fn sweep_unreachable(&mut self, finished: UnitId) {
        for id in self.arena.take_pass_log() {
            if !self.arena.contains(id) || self.arena[id].alternate.is_some() {
                continue;
            }
            if self.is_linked(id, finished) {
                continue;
            }
            log::trace!("reclaiming orphaned unit {id}");
            self.arena.free(id);
        }
    }

    fn is_linked(&self, id: UnitId, finished: UnitId) -> bool {
        let mut cursor = id;
        loop {
            if cursor == finished {
                return true;
            }
            let Some(parent) = self.arena.get(cursor).and_then(|unit| unit.parent) else {
                return false;
            };
            let Some(parent_unit) = self.arena.get(parent) else {
                return false;
            };
            let mut child = parent_unit.child;
            let mut found = false;
            while let Some(sibling) = child {
                if sibling == cursor {
                    found = true;
                    break;
                }
                child = self.arena.get(sibling).and_then(|unit| unit.sibling);
            }
            if !found {
                return false;
            }
            cursor = parent;
        }
    }

    // =========================================================================
    // Mutation sub-phase
    // =========================================================================

    fn commit_mutation_effects(&mut self, finished: UnitId) {
        let mask = EffectFlags::MUTATION_MASK | EffectFlags::PASSIVE_MASK;
        let mut next_effect = Some(finished);

        while let Some(unit) = next_effect {
            let child = self.arena[unit].child;
            if self.arena[unit].subtree_flags.intersects(mask) && child.is_some() {
                next_effect = child;
                continue;
            }
            // Leaf of the flagged region: apply here, then to siblings,
            // climbing until one offers a flagged descent again.
            let mut cursor = Some(unit);
            while let Some(id) = cursor {
                self.commit_mutation_on_unit(id);
                if let Some(sibling) = self.arena[id].sibling {
                    next_effect = Some(sibling);
                    break;
                }
                cursor = self.arena[id].parent;
                next_effect = cursor;
            }
        }
    }

    fn commit_mutation_on_unit(&mut self, unit: UnitId) {
        let flags = self.arena[unit].flags;

        if flags.contains(EffectFlags::PLACEMENT) {
            self.commit_placement(unit);
            self.arena[unit].flags -= EffectFlags::PLACEMENT;
        }
        if flags.contains(EffectFlags::UPDATE) {
            self.commit_update(unit);
            self.arena[unit].flags -= EffectFlags::UPDATE;
        }
        if flags.contains(EffectFlags::CHILD_DELETION) {
            let deletions = std::mem::take(&mut self.arena[unit].deletions);
            for child in deletions {
                self.commit_deletion(child);
            }
            self.arena[unit].flags -= EffectFlags::CHILD_DELETION;
        }
        if flags.contains(EffectFlags::PASSIVE) {
            self.graph.to_run.push(unit);
            self.arena[unit].flags -= EffectFlags::PASSIVE;
        }
        if flags.contains(EffectFlags::VISIBILITY) {
            self.commit_visibility(unit);
            self.arena[unit].flags -= EffectFlags::VISIBILITY;
        }
        if flags.contains(EffectFlags::REF) && self.arena[unit].alternate.is_some() {
            // Detach the previous binding; layout re-attaches the new one.
            let previous = self
                .arena[unit]
                .alternate
                .and_then(|alt| self.arena[alt].ref_binding.clone());
            if let Some(binding) = previous {
                binding.set(None);
            }
        }
    }

    fn commit_update(&mut self, unit: UnitId) {
        match self.arena[unit].kind {
            UnitKind::HostText => {
                let UnitProps::Text(content) = self.arena[unit].pending_props.clone() else {
                    unreachable!("text unit without text props");
                };
                let instance = self.host_instance_of(unit);
                self.host.commit_text_update(instance, &content);
            }
            UnitKind::HostComponent => {
                let UnitProps::Host { attrs, .. } = self.arena[unit].pending_props.clone() else {
                    unreachable!("host unit without host props");
                };
                let instance = self.host_instance_of(unit);
                self.host.commit_prop_update(instance, &attrs);
            }
            other => log::warn!("update flag on {other:?} has no host effect"),
        }
    }

    // =========================================================================
    // Placement
    // =========================================================================

    fn commit_placement(&mut self, unit: UnitId) {
        let parent = self.get_host_parent(unit);
        let before = self.get_host_sibling(unit);
        log::trace!("placing {unit} under {parent:?} before {before:?}");
        self.insert_or_append(unit, parent, before);
    }

    fn get_host_parent(&self, unit: UnitId) -> HostParent {
        let mut parent = self.arena[unit].parent;
        while let Some(id) = parent {
            match self.arena[id].kind {
                UnitKind::HostComponent => {
                    return HostParent::Instance(self.host_instance_of(id));
                }
                UnitKind::HostRoot => return HostParent::Container,
                _ => parent = self.arena[id].parent,
            }
        }
        log::warn!("no host parent above {unit}; falling back to the container");
        HostParent::Container
    }

    /// The nearest following host node that is itself stable (not flagged
    /// for placement); inserting before it preserves sibling order.
    fn get_host_sibling(&self, unit: UnitId) -> Option<HostHandle> {
        let mut node = unit;
        'siblings: loop {
            while self.arena[node].sibling.is_none() {
                let Some(parent) = self.arena[node].parent else {
                    return None;
                };
                if matches!(
                    self.arena[parent].kind,
                    UnitKind::HostComponent | UnitKind::HostRoot
                ) {
                    return None;
                }
                node = parent;
            }
            node = self.arena[node].sibling.expect("checked above");

            while !self.arena[node].is_host() {
                // An unstable subtree cannot anchor an insertion.
                if self.arena[node].flags.contains(EffectFlags::PLACEMENT) {
                    continue 'siblings;
                }
                match self.arena[node].child {
                    None => continue 'siblings,
                    Some(child) => node = child,
                }
            }

            if !self.arena[node].flags.contains(EffectFlags::PLACEMENT) {
                return self.arena[node].host_instance;
            }
        }
    }

    /// Attach `unit`'s topmost host nodes under `parent`, before `before`
    /// when one exists.
    fn insert_or_append(&mut self, unit: UnitId, parent: HostParent, before: Option<HostHandle>) {
        if self.arena[unit].is_host() {
            let instance = self.host_instance_of(unit);
            match before {
                Some(before) => self.host.insert_before(parent, instance, before),
                None => self.host.append_child(parent, instance),
            }
            return;
        }
        let mut child = self.arena[unit].child;
        while let Some(id) = child {
            self.insert_or_append(id, parent, before);
            child = self.arena[id].sibling;
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    fn commit_deletion(&mut self, child_to_delete: UnitId) {
        log::debug!("deleting subtree at {child_to_delete}");
        let subtree = self.collect_subtree(child_to_delete);

        // Salvage work from units that are about to become unreachable:
        // refs detach, unmount teardowns queue for the passive flush.
        for &id in &subtree {
            match self.arena[id].kind {
                UnitKind::HostComponent => {
                    if let Some(binding) = self.arena[id].ref_binding.clone() {
                        binding.set(None);
                    }
                }
                UnitKind::FunctionComponent => {
                    let hooks = std::mem::take(&mut self.arena[id].hooks);
                    for hook in hooks {
                        if let HookState::Effect(effect) = hook.state {
                            self.graph.to_unmount.push(effect);
                        }
                    }
                }
                _ => {}
            }
        }

        // Structural detach of the topmost host nodes only; their own
        // subtrees go with them.
        let mut top_hosts = Vec::new();
        self.collect_top_hosts(child_to_delete, &mut top_hosts);
        if !top_hosts.is_empty() {
            let parent = self.get_host_parent(child_to_delete);
            for instance in top_hosts {
                self.host.remove_child(parent, instance);
            }
        }

        // Both generations of every deleted instance are dead; return the
        // slot pairs to the arena.
        for id in subtree {
            if let Some(alternate) = self.arena[id].alternate {
                if self.arena.contains(alternate) {
                    self.arena.free(alternate);
                }
            }
            self.arena.free(id);
        }
    }

    fn collect_subtree(&self, root: UnitId) -> Vec<UnitId> {
        let mut out = Vec::new();
        let mut node = root;
        loop {
            out.push(node);
            if let Some(child) = self.arena[node].child {
                node = child;
                continue;
            }
            if node == root {
                break;
            }
            while self.arena[node].sibling.is_none() {
                match self.arena[node].parent {
                    None => return out,
                    Some(parent) if parent == root => return out,
                    Some(parent) => node = parent,
                }
            }
            node = self.arena[node].sibling.expect("checked above");
        }
        out
    }

    fn collect_top_hosts(&self, id: UnitId, out: &mut Vec<HostHandle>) {
        let unit = &self.arena[id];
        if unit.is_host() {
            if let Some(instance) = unit.host_instance {
                out.push(instance);
            }
            return;
        }
        let mut child = unit.child;
        while let Some(next) = child {
            self.collect_top_hosts(next, out);
            child = self.arena[next].sibling;
        }
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    fn commit_visibility(&mut self, unit: UnitId) {
        let hidden = matches!(
            self.arena[unit].pending_props,
            UnitProps::Offscreen { mode: OffscreenMode::Hidden, .. }
        );
        let mut top_hosts = Vec::new();
        self.collect_top_hosts(unit, &mut top_hosts);
        for instance in top_hosts {
            if hidden {
                self.host.hide(instance);
            } else {
                self.host.unhide(instance);
            }
        }
    }

    // =========================================================================
    // Layout sub-phase
    // =========================================================================

    fn commit_layout_effects(&mut self, finished: UnitId) {
        let mask = EffectFlags::LAYOUT_MASK;
        let mut next_effect = Some(finished);

        while let Some(unit) = next_effect {
            let child = self.arena[unit].child;
            if self.arena[unit].subtree_flags.intersects(mask) && child.is_some() {
                next_effect = child;
                continue;
            }
            let mut cursor = Some(unit);
            while let Some(id) = cursor {
                self.commit_layout_on_unit(id);
                if let Some(sibling) = self.arena[id].sibling {
                    next_effect = Some(sibling);
                    break;
                }
                cursor = self.arena[id].parent;
                next_effect = cursor;
            }
        }
    }

    fn commit_layout_on_unit(&mut self, unit: UnitId) {
        if !self.arena[unit].flags.contains(EffectFlags::REF) {
            return;
        }
        if self.arena[unit].kind == UnitKind::HostComponent {
            let instance = self.arena[unit].host_instance;
            if let Some(binding) = self.arena[unit].ref_binding.clone() {
                binding.set(instance);
            }
        }
        self.arena[unit].flags -= EffectFlags::REF;
    }

    // =========================================================================
    // Passive effects
    // =========================================================================

    /// Run deferred effects: every unmount teardown, then every pending
    /// update's stale teardown, then every pending update's setup — cleanup
    /// for a cycle always completes across the whole tree before any new
    /// setup observes shared state. Returns whether anything ran.
    pub(crate) fn flush_passive_effects(&mut self) -> Result<bool, ReconcileError> {
        if let Some(token) = self.graph.passive_token.take() {
            self.scheduler.cancel_callback(token);
        }

        let to_unmount = std::mem::take(&mut self.graph.to_unmount);
        let to_run = std::mem::take(&mut self.graph.to_run);
        if to_unmount.is_empty() && to_run.is_empty() {
            return Ok(false);
        }
        log::debug!(
            "passive flush: {} unmount, {} update units",
            to_unmount.len(),
            to_run.len()
        );

        for effect in to_unmount {
            if let Some(cleanup) = effect.cleanup.borrow_mut().take() {
                cleanup();
            }
        }

        let mut pending: Vec<EffectHook> = Vec::new();
        for unit in to_run {
            if !self.arena.contains(unit) {
                continue;
            }
            for hook in &self.arena[unit].hooks {
                if let HookState::Effect(effect) = &hook.state {
                    if effect.has_pending {
                        pending.push(effect.clone());
                    }
                }
            }
        }

        for effect in &pending {
            if let Some(cleanup) = effect.cleanup.borrow_mut().take() {
                cleanup();
            }
        }
        for effect in &pending {
            let cleanup = (effect.setup)();
            *effect.cleanup.borrow_mut() = cleanup;
        }

        // Updates issued inside effects take the normal scheduling path;
        // sync ones flush before control returns.
        self.drain_mailbox();
        self.flush_sync_callbacks()?;
        Ok(true)
    }

    fn host_instance_of(&self, unit: UnitId) -> HostHandle {
        self.arena[unit]
            .host_instance
            .expect("committed host unit without an instance")
    }
}
