//! Scheduling of restarts, reductions, simplifications and decisions.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::activity::decay_clause_activities;
use crate::clause::reduce::reduce;
use crate::context::{current_bytes, parts::*, Context};
use crate::decision::decide;
use crate::incremental::{assume_decide, find_failed_assumption};
use crate::prop::{propagate, undo};
use crate::simplify::simplify;
use crate::state::SatState;

/// Search control state and statistics counters.
#[derive(Default)]
pub struct Schedule {
    pub conflicts: u64,
    pub decisions: u64,
    pub sdecisions: u64,
    pub rdecisions: u64,
    pub restarts: u64,
    pub iterations: u64,
    pub simps: u64,
    pub reductions: u64,
    pub freductions: u64,

    /// Inner restart window and the conflict count of the next restart.
    pub drestart: u64,
    /// Outer restart limit.
    pub ddrestart: u64,
    pub lrestart: u64,

    /// Learned clause limit of the reduce trigger.
    pub lreduce: usize,
    /// Conflicts between forced reductions.
    pub dfreduce: u64,
    pub lastreduceconflicts: u64,
    /// Reduction count at the last outer restart transition.
    pub lastreductionsatrestart: u64,

    /// Propagation count that enables the next simplification.
    pub lsimplify: u64,
    /// Fixed assignment count of the last simplification.
    pub fsimplify: usize,

    srng: u32,
}

impl Schedule {
    /// Seed the random decision generator.
    pub fn set_seed(&mut self, seed: u32) {
        self.srng = seed;
    }

    /// The linear congruential generator behind random decisions.
    fn rng(&mut self) -> u32 {
        let res = self.srng;
        self.srng = self
            .srng
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        res
    }

    /// Uniform sample from `low..=high`.
    pub fn rrng(&mut self, low: u64, high: u64) -> u64 {
        debug_assert!(low <= high);
        let elements = high - low + 1;
        ((u64::from(self.rng()) * elements) >> 32) + low
    }
}

/// Reset the restart windows at the start of a solve.
fn init_restart(mut ctx: partial!(Context, mut ScheduleP, SolverConfigP)) {
    let min_interval = ctx.part(SolverConfigP).min_restart_interval;
    let schedule = ctx.part_mut(ScheduleP);
    schedule.drestart = min_interval;
    schedule.ddrestart = min_interval;
    schedule.lrestart = schedule.conflicts + schedule.drestart;
}

/// Restart the search, keeping level 0 intact.
///
/// The most recently learned long clause is pinned against the next
/// reduction. The inner window grows geometrically until it reaches the outer
/// window; then it resets and the outer window grows instead. On such an
/// outer transition without any reduction since the previous one, the learned
/// clause limit is raised.
fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        SolverConfigP,
    ),
) {
    ctx.part_mut(ScheduleP).restarts += 1;
    debug_assert!(ctx.part(TrailP).level() > 1);

    undo(ctx.borrow(), 0);

    // Pin the newest learned clause.
    {
        let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
        let alloc = ctx.part_mut(ClauseAllocP);
        for &cref in db.clauses.iter().rev() {
            let header = alloc.header_mut(cref);
            if header.deleted() {
                continue;
            }
            if header.fixed() {
                break;
            }
            if !header.learned() {
                continue;
            }
            header.set_fixed(true);
            db.lfixed += 1;
            break;
        }
    }

    let config = ctx.part(SolverConfigP);
    let factor = config.restart_factor_percent;
    let min_interval = config.min_restart_interval;
    let max_interval = config.max_restart_interval;
    let reduce_factor = config.reduce_factor_percent;

    let schedule = ctx.part_mut(ScheduleP);
    schedule.drestart = schedule.drestart * factor / 100;
    if schedule.drestart >= schedule.ddrestart {
        schedule.ddrestart = (schedule.ddrestart * factor / 100).min(max_interval);
        schedule.drestart = min_interval;

        if schedule.lastreductionsatrestart == schedule.reductions {
            schedule.lreduce = (schedule.lreduce as u64 * reduce_factor / 100) as usize;
        }
        schedule.lastreductionsatrestart = schedule.reductions;
    }
    debug_assert!(schedule.drestart <= max_interval);
    schedule.lrestart = schedule.conflicts + schedule.drestart;
}

/// Whether the learned clause database should be reduced now.
fn need_to_reduce(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        AssignmentP,
        BinaryClausesP,
        ClauseAllocP,
        ClauseDbP,
        ImplGraphP,
        JwWeightsP,
        ProofP,
        SolverConfigP,
        TrailP,
        VsidsP,
        WatchlistsP,
    ),
) -> bool {
    let bytes = current_bytes(ctx.borrow());
    let state = ctx.part_mut(SolverStateP);
    if bytes > state.max_bytes {
        state.max_bytes = bytes;
    }

    if bytes >= ctx.part(SolverConfigP).memory_limit_bytes {
        return true;
    }

    let reduce_factor = ctx.part(SolverConfigP).reduce_factor_percent;
    let schedule = ctx.part_mut(ScheduleP);

    if schedule.lastreduceconflicts + schedule.dfreduce <= schedule.conflicts {
        schedule.dfreduce = schedule.dfreduce * reduce_factor / 100;
        schedule.freductions += 1;
        return true;
    }

    let db = ctx.part(ClauseDbP);
    db.lclauses >= ctx.part(ScheduleP).lreduce + db.llocked + db.lfixed
}

/// The search returned to level 0 after backtracking.
fn iteration(mut ctx: partial!(Context, mut ScheduleP)) {
    let schedule = ctx.part_mut(ScheduleP);
    schedule.iterations += 1;
    schedule.lrestart = schedule.conflicts + schedule.drestart;
}

/// Run the CDCL search until a verdict is reached or the decision budget is
/// exhausted.
///
/// The result is left in the solver state; `SatState::Unknown` means the
/// budget ran out with all invariants intact, so a later call can resume.
pub fn search(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut JwWeightsP,
        mut ProofP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    decision_limit: Option<u64>,
) {
    if ctx.part(SolverStateP).conflict.is_some() {
        conflict_step(ctx.borrow());
    }

    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat | SatState::UnsatUnderAssumptions => return,
        _ => ctx.part_mut(SolverStateP).sat_state = SatState::Unknown,
    }

    init_restart(ctx.borrow());
    let initial_forced_reduce = ctx.part(SolverConfigP).initial_forced_reduce;
    ctx.part_mut(ScheduleP).dfreduce = initial_forced_reduce;
    ctx.part_mut(ScheduleP).fsimplify = 0;

    let mut backtracked = false;
    let mut count = 0u64;

    loop {
        if ctx.part(SolverStateP).conflict.is_none() {
            propagate(ctx.borrow());
        }

        if ctx.part(SolverStateP).conflict.is_some() {
            conflict_step(ctx.borrow());

            match ctx.part(SolverStateP).sat_state {
                SatState::Unsat | SatState::UnsatUnderAssumptions => return,
                _ => (),
            }

            ctx.part_mut(VsidsP).decay();
            decay_clause_activities(ctx.borrow());

            let conflicts = ctx.part(ScheduleP).conflicts;
            if conflicts % 5000 == 0 {
                let schedule = ctx.part(ScheduleP);
                let db = ctx.part(ClauseDbP);
                info!(
                    "confl: {}k rest: {} fixed: {} bin: {} irred: {} learned: {} limit: {}",
                    conflicts / 1000,
                    schedule.restarts,
                    ctx.part(TrailP).fixed,
                    ctx.part(BinaryClausesP).count(),
                    db.oclauses,
                    db.lclauses,
                    schedule.lreduce + db.llocked + db.lfixed,
                );
            }

            backtracked = true;
            continue;
        }

        // A total assignment satisfies the formula.
        if ctx.part(TrailP).len() == ctx.part(VariablesP).count() {
            if !ctx.part(IncrementalP).assumptions().is_empty() {
                find_failed_assumption(ctx.borrow());
                if ctx.part(IncrementalP).failed_assumption().is_some() {
                    ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
                    return;
                }
            }
            ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
            return;
        }

        if ctx.part(IncrementalP).has_pending() {
            if !assume_decide(ctx.borrow()) {
                find_failed_assumption(ctx.borrow());
                debug_assert!(ctx.part(IncrementalP).failed_assumption().is_some());
                ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
                return;
            }
            continue;
        }

        if backtracked {
            backtracked = false;
            if ctx.part(TrailP).level() == 0 {
                iteration(ctx.borrow());
            }
        }

        if let Some(limit) = decision_limit {
            if count >= limit {
                return;
            }
        }

        if ctx.part(ScheduleP).fsimplify < ctx.part(TrailP).fixed
            && ctx.part(ScheduleP).lsimplify <= ctx.part(TrailP).propagations
        {
            simplify(ctx.borrow());
            if !ctx.part(TrailP).fully_propagated() {
                continue;
            }
        }

        if ctx.part(ScheduleP).lreduce == 0 {
            let initial = (ctx.part(ClauseDbP).oclauses / 4).max(1000);
            ctx.part_mut(ScheduleP).lreduce = initial;
        }

        if need_to_reduce(ctx.borrow()) {
            reduce(ctx.borrow());
        }

        if ctx.part(ScheduleP).conflicts >= ctx.part(ScheduleP).lrestart
            && ctx.part(TrailP).level() > 2
        {
            restart(ctx.borrow());
        }

        decide(ctx.borrow());
        count += 1;
    }
}
