//! Propagation of long clauses.
use partial_ref::{partial, PartialRef};

use tracsat_formula::Lit;

use crate::context::{parts::*, Context};

use super::{assign, Conflict, Reason, Watch};

/// Propagate all literals implied by long clauses watched on the negation of
/// the given just assigned literal.
///
/// The watch list is taken out of the watchlists while it is scanned, so
/// watches can be moved onto other literals in the same pass. On conflict the
/// remaining unprocessed watches are preserved before returning.
pub fn propagate_long(
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

    let mut watches = ctx.part_mut(WatchlistsP).take_watched_on(false_lit);

    let mut conflict = None;
    let mut write = 0;
    let mut read = 0;

    'watches: while read < watches.len() {
        let watch = watches[read];
        read += 1;

        // If the blocking literal is already true the watched clause is
        // satisfied and we don't even have to look at it.
        if ctx.part(AssignmentP).lit_is_true(watch.blocking) {
            watches[write] = watch;
            write += 1;
            continue;
        }

        let cref = watch.cref;

        // Normalize so the other watched literal is in position 0. This keeps
        // the propagated literal of a unit clause at position 0.
        let first = {
            let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
            let lits = clause.lits_mut();
            if lits[0] == false_lit {
                lits.swap(0, 1);
            }
            lits[0]
        };

        let new_watch = Watch {
            cref,
            blocking: first,
        };

        // The other watched literal might satisfy the clause.
        if first != watch.blocking && ctx.part(AssignmentP).lit_is_true(first) {
            watches[write] = new_watch;
            write += 1;
            continue;
        }

        // Search the unwatched literals for a replacement watch.
        let clause_len = ctx.part(ClauseAllocP).header(cref).len();
        for pos in 2..clause_len {
            let candidate = ctx.part(ClauseAllocP).clause(cref).lits()[pos];
            if ctx.part(AssignmentP).lit_is_false(candidate) {
                continue;
            }

            {
                let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
                let lits = clause.lits_mut();
                lits[1] = candidate;
                lits[pos] = false_lit;
            }

            // A watch moved onto a literal that is fixed true is dropped
            // together with the clause's presence in the watch lists of fixed
            // literals.
            let fixed_true = ctx.part(AssignmentP).lit_is_true(candidate)
                && ctx.part(ImplGraphP).is_fixed(candidate.var())
                && ctx.part(WatchlistsP).is_empty(candidate);

            if !fixed_true {
                debug_assert_ne!(candidate, false_lit);
                ctx.part_mut(WatchlistsP).add_watch(candidate, new_watch);
            }

            continue 'watches;
        }

        // No replacement found: the clause is unit or conflicting.
        watches[write] = new_watch;
        write += 1;

        if ctx.part(AssignmentP).lit_is_false(first) {
            conflict = Some(Conflict::Long(cref));
            break;
        }

        assign(ctx.borrow(), first, Reason::Long(cref));
    }

    // Preserve unprocessed watches after a conflict.
    while read < watches.len() {
        watches[write] = watches[read];
        write += 1;
        read += 1;
    }
    watches.truncate(write);

    ctx.part_mut(WatchlistsP).put_watched_on(false_lit, watches);

    match conflict {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}
