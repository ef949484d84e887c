//! Scheduling, the render pass and commit for a [`FiberRoot`](crate::FiberRoot).

use std::rc::Weak;

use crate::begin_work::begin_work;
use crate::commit_work::{commit_mutation_effects, CommitContext, CommitReport};
use crate::complete_work::complete_work;
use crate::error::ReconcileError;
use crate::fiber::{create_work_in_progress, FiberArena, FiberId, FiberProps};
use crate::flags::Flags;
use crate::hooks::UpdateTarget;
use crate::host::Host;
use crate::lanes::{Lane, Lanes, NO_LANE};
use crate::root::{RootInner, RootState};

/// Sync re-renders a root may trigger in a row before it is considered
/// stuck in an update loop.
pub const NESTED_UPDATE_LIMIT: usize = 50;

/// What begin and complete work need for one render pass.
pub(crate) struct RenderContext<'a> {
    pub(crate) arena: &'a mut FiberArena,
    pub(crate) host: &'a mut dyn Host,
    pub(crate) lane: Lane,
    pub(crate) target: Weak<dyn UpdateTarget>,
}

impl<H: Host + 'static> UpdateTarget for RootInner<H> {
    fn schedule_update(&self, lane: Lane) {
        self.schedule_update_on_fiber(lane);
    }
}

impl<H: Host + 'static> RootInner<H> {
    pub(crate) fn schedule_update_on_fiber(&self, lane: Lane) {
        self.pending_lanes.set(self.pending_lanes.get().merge(lane));
        self.ensure_root_is_scheduled();
    }

    /// Makes sure a sync callback is queued for the most urgent pending
    /// lane. A callback already queued for that lane is left alone.
    pub(crate) fn ensure_root_is_scheduled(&self) {
        let next_lane = self.pending_lanes.get().highest_priority();
        if next_lane == NO_LANE {
            self.callback_lane.set(NO_LANE);
            return;
        }
        if self.callback_lane.get() == next_lane {
            return;
        }
        self.callback_lane.set(next_lane);
        log::trace!("scheduling sync work for lane {next_lane:?}");
        let root = self.this.clone();
        self.runtime
            .schedule_sync_callback(Box::new(move || match root.upgrade() {
                Some(root) => root.perform_sync_work_on_root(next_lane),
                None => Err(ReconcileError::RootDropped),
            }));
    }

    fn perform_sync_work_on_root(&self, lane: Lane) -> Result<(), ReconcileError> {
        if self.callback_lane.get() == lane {
            self.callback_lane.set(NO_LANE);
        }
        self.flush_passive_effects()?;

        let next_lane = self.pending_lanes.get().highest_priority();
        if next_lane == NO_LANE {
            return Ok(());
        }
        if next_lane != lane {
            log::debug!("callback for lane {lane:?} superseded by {next_lane:?}");
            self.ensure_root_is_scheduled();
            return Ok(());
        }
        if self.nested_update_count.get() > NESTED_UPDATE_LIMIT {
            self.nested_update_count.set(0);
            self.pending_lanes.set(self.pending_lanes.get().without(lane));
            log::error!("root re-rendered more than {NESTED_UPDATE_LIMIT} times in a row");
            return Err(ReconcileError::UpdateDepthExceeded {
                limit: NESTED_UPDATE_LIMIT,
            });
        }

        // Updates arriving from here on must bring the lane back.
        self.pending_lanes.set(self.pending_lanes.get().without(lane));

        let has_passive_effects = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            match self.render_root_sync(state, lane) {
                Ok(finished_work) => self.commit_root(state, finished_work, lane)?,
                Err(error) => {
                    let released = state.arena.discard_pass();
                    log::debug!("render on lane {lane:?} failed, released {released} fibers: {error}");
                    return Err(error);
                }
            }
        };

        if self.pending_lanes.get().includes(Lanes::SYNC) {
            self.nested_update_count.set(self.nested_update_count.get() + 1);
        } else {
            self.nested_update_count.set(0);
        }
        if has_passive_effects {
            self.schedule_passive_flush();
        }
        self.ensure_root_is_scheduled();
        Ok(())
    }

    /// Builds the work-in-progress tree for `lane` and returns its root.
    fn render_root_sync(
        &self,
        state: &mut RootState<H>,
        lane: Lane,
    ) -> Result<FiberId, ReconcileError> {
        log::debug!("render pass on lane {lane:?}");
        state.arena.begin_pass();
        let root = create_work_in_progress(&mut state.arena, state.current, FiberProps::Empty)?;
        let target: Weak<dyn UpdateTarget> = self.this.clone();
        let mut ctx = RenderContext {
            arena: &mut state.arena,
            host: &mut state.host,
            lane,
            target,
        };
        work_loop_sync(&mut ctx, root)?;
        Ok(root)
    }

    /// Applies `finished_work` to the host and makes it current. Returns
    /// whether passive effects are now pending.
    fn commit_root(
        &self,
        state: &mut RootState<H>,
        finished_work: FiberId,
        lane: Lane,
    ) -> Result<bool, ReconcileError> {
        let mut report = CommitReport::new(lane);
        {
            let RootState {
                arena,
                host,
                container,
                pending_passive_effects,
                ..
            } = &mut *state;
            let fiber = arena.get(finished_work)?;
            let flags = fiber.flags | fiber.subtree_flags;
            if flags.intersects(Flags::MUTATION_MASK | Flags::PASSIVE_MASK) {
                let mut ctx = CommitContext {
                    arena,
                    host,
                    container: *container,
                    passive: pending_passive_effects,
                    report: &mut report,
                };
                commit_mutation_effects(&mut ctx, finished_work)?;
            }
        }

        state.current = finished_work;
        state.arena.finish_pass();
        log::debug!(
            "committed lane {lane:?}: {} host mutations, {} live fibers",
            report.mutation_count(),
            state.arena.len()
        );
        state.last_commit = Some(report);
        Ok(!state.pending_passive_effects.is_empty())
    }

    fn schedule_passive_flush(&self) {
        if self.passive_flush_scheduled.replace(true) {
            return;
        }
        let root = self.this.clone();
        self.runtime.spawn_task(Box::new(move || {
            let Some(root) = root.upgrade() else {
                return Ok(());
            };
            root.passive_flush_scheduled.set(false);
            root.flush_passive_effects().map(|_| ())
        }));
    }

    /// Runs queued destroys and creates, then any sync work they caused.
    pub(crate) fn flush_passive_effects(&self) -> Result<bool, ReconcileError> {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending_passive_effects);
        if pending.is_empty() {
            return Ok(false);
        }
        log::debug!(
            "flushing {} unmounted and {} updated effects",
            pending.unmount.len(),
            pending.update.len()
        );
        pending.flush();
        self.runtime.flush_sync_callbacks()?;
        Ok(true)
    }
}

fn work_loop_sync(ctx: &mut RenderContext<'_>, root: FiberId) -> Result<(), ReconcileError> {
    let mut work_in_progress = Some(root);
    while let Some(unit) = work_in_progress {
        work_in_progress = perform_unit_of_work(ctx, unit, root)?;
    }
    Ok(())
}

fn perform_unit_of_work(
    ctx: &mut RenderContext<'_>,
    unit: FiberId,
    root: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let next = begin_work(ctx, unit)?;
    let fiber = ctx.arena.get_mut(unit)?;
    fiber.memoized_props = fiber.pending_props.clone();
    match next {
        Some(child) => Ok(Some(child)),
        None => complete_unit_of_work(ctx, unit, root),
    }
}

/// Completes `unit` and its ancestors until one has an unvisited sibling.
fn complete_unit_of_work(
    ctx: &mut RenderContext<'_>,
    unit: FiberId,
    root: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let mut completed = unit;
    loop {
        complete_work(ctx, completed)?;
        if completed == root {
            return Ok(None);
        }
        let fiber = ctx.arena.get(completed)?;
        if let Some(sibling) = fiber.sibling {
            return Ok(Some(sibling));
        }
        match fiber.parent {
            Some(parent) => completed = parent,
            None => return Ok(None),
        }
    }
}
