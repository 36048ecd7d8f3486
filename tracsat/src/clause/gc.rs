//! Garbage collection of long clauses.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use crate::context::{parts::*, Context};
use crate::prop::{Reason, Watch};

use super::{ClauseAlloc, ClauseRef};

/// Compact the clause storage, dropping all deleted clauses.
///
/// All clauses move to a fresh allocator, so every stored [`ClauseRef`] has
/// to be rewritten: the clause list, the reasons on the trail and the watch
/// lists, which are rebuilt from scratch. Stale halves of satisfied binary
/// clauses are purged in the same pass.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    let mut forward: FxHashMap<ClauseRef, ClauseRef> = FxHashMap::default();

    {
        let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
        let alloc = ctx.part_mut(ClauseAllocP);

        assert!(
            db.garbage_size <= alloc.buffer_size(),
            "inconsistent garbage tracking in ClauseDb"
        );
        let current_size = alloc.buffer_size() - db.garbage_size;

        // Allocating just the current size would lead to an immediate growing
        // when new clauses are learned, overallocating here avoids that.
        let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);
        let mut new_clauses = vec![];

        for &cref in db.clauses.iter() {
            let clause = alloc.clause(cref);
            if clause.header().deleted() {
                continue;
            }

            let new_cref = new_alloc.add_clause(clause.header().clone(), clause.lits());
            new_clauses.push(new_cref);
            forward.insert(cref, new_cref);
        }

        *alloc = new_alloc;
        db.clauses = new_clauses;
        db.garbage_size = 0;
    }

    // Rewrite the long reasons of assigned literals.
    {
        let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
        for &lit in ctx.part(TrailP).trail().iter() {
            if let Reason::Long(cref) = *impl_graph.reason(lit.var()) {
                let new_cref = forward[&cref];
                impl_graph.update_reason(lit.var(), Reason::Long(new_cref));
            }
        }
    }

    // Rebuild the watch lists. Watch lists of literals fixed true outside of
    // assumptions stay empty.
    ctx.part_mut(WatchlistsP).clear_all();

    for index in 0..ctx.part(ClauseDbP).clauses.len() {
        let cref = ctx.part(ClauseDbP).clauses[index];
        let [lit_0, lit_1] = {
            let lits = ctx.part(ClauseAllocP).clause(cref).lits();
            [lits[0], lits[1]]
        };

        for &(lit, blocking) in [(lit_0, lit_1), (lit_1, lit_0)].iter() {
            let dead = ctx.part(AssignmentP).lit_is_true(lit)
                && ctx.part(ImplGraphP).is_fixed(lit.var());
            if !dead {
                ctx.part_mut(WatchlistsP)
                    .add_watch(lit, Watch { cref, blocking });
            }
        }
    }

    // Purge implication list entries pointing at literals fixed true outside
    // of assumptions; those clauses are permanently satisfied.
    {
        let (binary, ctx) = ctx.split_part_mut(BinaryClausesP);
        let assignment = ctx.part(AssignmentP);
        let impl_graph = ctx.part(ImplGraphP);
        binary
            .purge(|other| assignment.lit_is_true(other) && impl_graph.is_fixed(other.var()));
    }
}
