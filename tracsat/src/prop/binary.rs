//! Propagation of binary clauses.
use partial_ref::{partial, PartialRef};

use tracsat_formula::Lit;

use crate::context::{parts::*, Context};

use super::{assign, Conflict, Reason};

/// Propagate all literals implied by the given just assigned literal via
/// binary clauses.
///
/// No binary clause object exists; implications are assigned with a compact
/// literal reason. On conflict the conflicting clause is returned as a
/// literal pair.
pub fn propagate_binary(
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
    lit: Lit,
) -> Result<(), Conflict> {
    let false_lit = !lit;

    let mut index = 0;
    loop {
        // The list can grow while we assign implications of other clauses
        // containing `false_lit`, so it is re-read each iteration.
        let implied = {
            let binary = ctx.part(BinaryClausesP);
            let list = binary.implied_on(false_lit);
            match list.get(index) {
                Some(&implied) => implied,
                None => break,
            }
        };
        index += 1;

        let assignment = ctx.part(AssignmentP);
        if assignment.lit_is_true(implied) {
            continue;
        }

        if assignment.lit_is_false(implied) {
            return Err(Conflict::Binary([false_lit, implied]));
        }

        assign(ctx.borrow(), implied, Reason::Binary([false_lit]));
    }

    Ok(())
}
