//! Learned clause database reduction.
use std::cmp::Ordering;

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::flt::Flt;
use crate::simplify::clause_is_toplevel_satisfied;

use super::db::delete_clause;
use super::gc::collect_garbage;
use super::ClauseRef;

/// Order candidates for deletion: lowest activity first, ties towards larger
/// clauses so that shorter clauses are preferred for keeping.
fn cmp_candidates(
    ctx: partial!(Context, ClauseAllocP),
    a: ClauseRef,
    b: ClauseRef,
) -> Ordering {
    let alloc = ctx.part(ClauseAllocP);
    let header_a = alloc.header(a);
    let header_b = alloc.header(b);

    header_a
        .activity()
        .cmp(&header_b.activity())
        .then(header_b.len().cmp(&header_a.len()))
}

/// Delete roughly the less active half of the learned clauses.
///
/// Locked and pinned clauses are skipped; top level satisfied clauses are
/// collected outright when new top level assignments arrived since the last
/// simplification. The survivors of the sorted candidate list are the upper
/// half, but a skewed activity distribution extends the deleted range to
/// everything below `cinc / 2^ceil(log2(target))`, and the boundary is moved
/// so that equal candidates are never split arbitrarily.
pub fn reduce(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ScheduleP,
        mut WatchlistsP,
        AssignmentP,
        ClauseActivityP,
        SolverConfigP,
        TrailP,
    ),
) {
    let conflicts = ctx.part(ScheduleP).conflicts;
    ctx.part_mut(ScheduleP).lastreduceconflicts = conflicts;

    let simplify_satisfied = ctx.part(ScheduleP).fsimplify < ctx.part(TrailP).fixed;

    let mut collect = 0usize;
    let mut candidates: Vec<ClauseRef> = vec![];

    for index in 0..ctx.part(ClauseDbP).clauses.len() {
        let cref = ctx.part(ClauseDbP).clauses[index];

        let (deleted, fixed, locked, learned) = {
            let header = ctx.part(ClauseAllocP).header(cref);
            (
                header.deleted(),
                header.fixed(),
                header.locked(),
                header.learned(),
            )
        };

        if deleted || fixed || locked {
            continue;
        }

        if simplify_satisfied && clause_is_toplevel_satisfied(ctx.borrow(), cref) {
            delete_clause(ctx.borrow(), cref);
            collect += 1;
        } else if learned {
            candidates.push(cref);
        }
    }

    let fixed = ctx.part(TrailP).fixed;
    ctx.part_mut(ScheduleP).fsimplify = fixed;

    candidates.sort_unstable_by(|&a, &b| cmp_candidates(ctx.borrow(), a, b));

    let rcount = candidates.len();
    let lclauses = ctx.part(ClauseDbP).lclauses;

    let half = lclauses / 2;
    let target = lclauses + 1;

    let mut log2_target = 1;
    while (1usize << log2_target) < target {
        log2_target += 1;
    }

    let min_activity = ctx
        .part(ClauseActivityP)
        .cinc
        .mul(Flt::from_base2(1, -(log2_target as i32)));

    fn activity_at(ctx: partial!(Context, ClauseAllocP), cref: ClauseRef) -> Flt {
        ctx.part(ClauseAllocP).header(cref).activity()
    }

    let cut = if half + 1 >= rcount {
        // Few enough candidates to collect them all.
        rcount
    } else if activity_at(ctx.borrow(), candidates[half]) < min_activity {
        // The activity distribution is skewed with the median below the
        // maximum average activity: collect everything below it.
        let mut cut = half + 1;
        while cut < rcount && activity_at(ctx.borrow(), candidates[cut]) < min_activity {
            cut += 1;
        }
        cut
    } else if cmp_candidates(ctx.borrow(), candidates[half], candidates[half + 1])
        == Ordering::Less
    {
        half + 1
    } else {
        // The sort is not stable, so move to a position where the comparison
        // actually separates instead of splitting a run of equal candidates.
        let mut cut = half;
        while cut > 0
            && cmp_candidates(ctx.borrow(), candidates[cut - 1], candidates[cut])
                == Ordering::Equal
        {
            cut -= 1;
        }
        cut
    };

    for &cref in candidates[..cut].iter() {
        delete_clause(ctx.borrow(), cref);
        collect += 1;
    }

    if collect > 0 {
        ctx.part_mut(ScheduleP).reductions += 1;
        collect_garbage(ctx.borrow());
        log::debug!("reduce: {} clauses collected", collect);
    } else {
        let factor = ctx.part(SolverConfigP).reduce_factor_percent;
        let schedule = ctx.part_mut(ScheduleP);
        schedule.lreduce = (schedule.lreduce as u64 * factor / 100) as usize;
    }
}
