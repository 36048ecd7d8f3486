//! Top level simplification.
//!
//! Whenever enough propagation work has happened since the last pass and new
//! top level assignments arrived, all clauses satisfied at the top level are
//! collected. Clauses satisfied only under assumptions are kept.
use partial_ref::{partial, PartialRef};

use crate::clause::db::delete_clause;
use crate::clause::gc::collect_garbage;
use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};

/// Whether a clause is satisfied by a top level assignment outside of any
/// assumption.
pub(crate) fn clause_is_toplevel_satisfied(
    ctx: partial!(Context, AssignmentP, ClauseAllocP, ImplGraphP),
    cref: ClauseRef,
) -> bool {
    let assignment = ctx.part(AssignmentP);
    let impl_graph = ctx.part(ImplGraphP);

    ctx.part(ClauseAllocP)
        .clause(cref)
        .lits()
        .iter()
        .any(|&lit| assignment.lit_is_true(lit) && impl_graph.is_fixed(lit.var()))
}

/// Collect all clauses satisfied at the top level.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ScheduleP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    let mut collect = 0;

    for index in 0..ctx.part(ClauseDbP).clauses.len() {
        let cref = ctx.part(ClauseDbP).clauses[index];

        let header = ctx.part(ClauseAllocP).header(cref);
        if header.deleted() || header.fixed() || header.locked() {
            continue;
        }

        if clause_is_toplevel_satisfied(ctx.borrow(), cref) {
            delete_clause(ctx.borrow(), cref);
            collect += 1;
        }
    }

    if collect > 0 {
        collect_garbage(ctx.borrow());
    }

    let next_simplify =
        ctx.part(TrailP).propagations + 10 * (ctx.part(ClauseDbP).olits + ctx.part(ClauseDbP).llits) as u64;

    let schedule = ctx.part_mut(ScheduleP);
    schedule.lsimplify = next_simplify;
    schedule.simps += 1;

    let fixed = ctx.part(TrailP).fixed;
    ctx.part_mut(ScheduleP).fsimplify = fixed;

    log::debug!("simplify: {} clauses collected", collect);
}
