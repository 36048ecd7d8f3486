//! Unit propagation.
pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{
    assign, assign_assumption, assign_decision, undo, unassign_from_trail, Assignment, Trail,
};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use watch::{Watch, Watchlists};

use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::state::SatState;

use binary::propagate_binary;
use long::propagate_long;

/// Propagate all enqueued assignments.
///
/// Implications through binary clauses are preferred: the binary cursor is
/// drained before any long clause watch lists are visited. A conflict is
/// latched in the solver state and stops propagation.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut JwWeightsP,
        mut ProofP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
        ClauseActivityP,
        VsidsP,
    ),
) {
    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat | SatState::UnsatUnderAssumptions => {
            ctx.part_mut(SolverStateP).conflict = None;
            return;
        }
        _ => (),
    }

    while ctx.part(SolverStateP).conflict.is_none() {
        let next_binary = ctx.part_mut(TrailP).pop_binary_queue();
        if let Some(lit) = next_binary {
            if let Err(conflict) = propagate_binary(ctx.borrow(), lit) {
                ctx.part_mut(SolverStateP).conflict = Some(conflict);
            }
            continue;
        }

        let next_long = ctx.part_mut(TrailP).pop_long_queue();
        if let Some(lit) = next_long {
            if let Err(conflict) = propagate_long(ctx.borrow(), lit) {
                ctx.part_mut(SolverStateP).conflict = Some(conflict);
            }
            continue;
        }

        break;
    }
}
