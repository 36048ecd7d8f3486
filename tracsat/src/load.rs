//! Building simplified clauses from staged literals.
use std::cmp::Ordering;
use std::mem::replace;

use partial_ref::{partial, PartialRef};

use tracsat_formula::Lit;

use crate::clause::db::{add_long_clause, mark_used};
use crate::clause::{ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::proof::ClauseId;
use crate::prop::{assign, Conflict, Reason};
use crate::state::SatState;
use crate::tmp::Antecedent;

/// Maximum number of literals in a single clause.
pub const MAX_CLAUSE_SIZE: usize = 1 << 24;

/// The shape a staged clause ended up with.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AddedClause {
    Empty,
    Unit { lit: Lit, id: ClauseId },
    Binary([Lit; 2]),
    Long(ClauseRef),
}

/// Remove duplicate literals and detect trivially satisfied clauses.
///
/// Sorts the staged literals so that duplicates and complementary pairs
/// become adjacent. Returns true when the clause can be discarded entirely:
/// it contains a pair of complementary literals or a literal that is already
/// true at the top level.
fn trivial_clause(
    mut ctx: partial!(Context, mut TmpDataP, AssignmentP, ImplGraphP),
) -> bool {
    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    let assignment = ctx.part(AssignmentP);
    let impl_graph = ctx.part(ImplGraphP);

    tmp.lits.sort_unstable_by(|a, b| b.code().cmp(&a.code()));

    let mut prev: Option<Lit> = None;
    let mut write = 0;

    for read in 0..tmp.lits.len() {
        let this = tmp.lits[read];

        if prev == Some(this) {
            continue;
        }

        if impl_graph.level(this.var()) == 0 && assignment.lit_is_true(this) {
            return true;
        }

        if prev == Some(!this) {
            return true;
        }

        tmp.lits[write] = this;
        write += 1;
        prev = Some(this);
    }

    tmp.lits.truncate(write);

    false
}

/// Add the staged clause after simplification, discarding trivial clauses.
pub fn simplify_and_add_clause(
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
    learned: bool,
) -> Option<AddedClause> {
    if trivial_clause(ctx.borrow()) {
        ctx.part_mut(TmpDataP).lits.clear();
        None
    } else {
        Some(add_simplified_clause(ctx.borrow(), learned))
    }
}

/// Trace ids of the collected antecedents.
fn antecedent_ids(
    ctx: partial!(Context, ClauseAllocP, ProofP, TmpDataP),
) -> Vec<ClauseId> {
    let proof = ctx.part(ProofP);
    let alloc = ctx.part(ClauseAllocP);

    ctx.part(TmpDataP)
        .resolved
        .iter()
        .map(|antecedent| match *antecedent {
            Antecedent::Long(cref) => alloc.header(cref).trace_id(),
            Antecedent::Binary(lits) => proof.binary_id(lits),
            Antecedent::Unit(id) => id,
        })
        .collect()
}

/// Add the staged clause to the solver.
///
/// The staged literals must be free of duplicates and complementary pairs.
/// This performs the whole clause intake: antecedent bookkeeping and trace
/// recording, storage dispatch by size, watch connection, Jeroslow-Wang
/// weight updates, unit assignment and conflict detection.
///
/// A new clause containing false literals at the top level is resolved
/// against those literals' reasons and re-added in its simplified form; the
/// weaker original stays behind as an antecedent of the derived clause.
pub fn add_simplified_clause(
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
    learned: bool,
) -> AddedClause {
    let mut learned = learned;

    loop {
        let mut lits = replace(&mut ctx.part_mut(TmpDataP).lits, vec![]);
        let size = lits.len();
        assert!(size < MAX_CLAUSE_SIZE, "maximal clause size exhausted");

        // Mark the antecedents of this clause as used and record the trace
        // entry. Original clauses have no antecedents, learned clauses store
        // the compressed chain of theirs.
        for index in 0..ctx.part(TmpDataP).resolved.len() {
            if let Antecedent::Long(cref) = ctx.part(TmpDataP).resolved[index] {
                mark_used(ctx.borrow(), cref);
            }
        }

        let tracing = ctx.part(ProofP).is_enabled();
        let id = if tracing {
            if learned {
                let ids = antecedent_ids(ctx.borrow());
                ctx.part_mut(ProofP).add_learned(ids)
            } else {
                ctx.part_mut(ProofP).add_original(&lits)
            }
        } else {
            0
        };
        ctx.part_mut(TmpDataP).resolved.clear();

        if learned {
            ctx.part_mut(ClauseDbP).ladded += 1;
        } else {
            ctx.part_mut(ClauseDbP).oadded += 1;
        }

        if size >= 3 {
            sort_staged(ctx.borrow(), &mut lits);
        } else if size == 2 && lits[0].code() > lits[1].code() {
            lits.swap(0, 1);
        }

        // Count the assignment status of the literals and find an assumption
        // literal if one is present.
        let mut num_true = 0;
        let mut num_undef = 0;
        let mut num_false = 0;
        let mut num_false_assumption = 0;
        let mut assumption = None;

        for &lit in lits.iter() {
            let value = ctx.part(AssignmentP).lit_value(lit);
            match value {
                Some(true) => num_true += 1,
                None => num_undef += 1,
                Some(false) => num_false += 1,
            }

            if ctx.part(ImplGraphP).is_assumption(lit.var()) {
                if value == Some(false) {
                    num_false_assumption += 1;
                }
                if assumption.is_none() {
                    assumption = Some(lit);
                }
            }
        }
        debug_assert_eq!(num_true + num_undef + num_false, size);

        if !learned && num_true == 0 {
            ctx.part_mut(JwWeightsP).bump_clause(&lits);
        }

        // Store the clause and connect the watches.
        let added = match size {
            0 => {
                ctx.part_mut(ClauseDbP).empty_added = true;
                AddedClause::Empty
            }
            1 => {
                if !learned {
                    let lit = lits[0];
                    ctx.part_mut(ClauseDbP).units.push(lit);
                }
                AddedClause::Unit { lit: lits[0], id }
            }
            2 => {
                let pair = [lits[0], lits[1]];
                ctx.part_mut(BinaryClausesP).add_binary_clause(pair);
                if tracing {
                    ctx.part_mut(ProofP).register_binary(pair, id);
                }
                AddedClause::Binary(pair)
            }
            _ => {
                let mut header = ClauseHeader::new();
                header.set_learned(learned);
                header.set_trace_id(id);
                if learned {
                    header.set_activity(ctx.part(ClauseActivityP).cinc);
                }
                let cref = add_long_clause(ctx.borrow(), header, &lits);
                ctx.part_mut(WatchlistsP)
                    .watch_clause(cref, [lits[0], lits[1]]);
                AddedClause::Long(cref)
            }
        };

        // An all-false clause containing an assumption fails the assumptions;
        // an empty clause makes the formula unsatisfiable outright. The
        // recorded literal is the assumption side, i.e. the negation of the
        // falsified clause literal.
        if let Some(assumption) = assumption {
            if num_true + num_undef == 0
                && ctx.part(IncrementalP).failed_assumption().is_none()
            {
                ctx.part_mut(IncrementalP).set_failed_assumption(!assumption);
                ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
            }
        } else if size == 0 {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            ctx.part_mut(ProofP).set_empty_clause(id);
            return AddedClause::Empty;
        }

        // Shrink the clause by resolving it against top level assignments.
        if ctx.part(TrailP).level() == 0 && num_false > num_false_assumption {
            debug_assert!(ctx.part(TmpDataP).resolved.is_empty());

            let own_antecedent = match added {
                AddedClause::Long(cref) => Antecedent::Long(cref),
                AddedClause::Binary(pair) => Antecedent::Binary(pair),
                AddedClause::Unit { id, .. } => Antecedent::Unit(id),
                AddedClause::Empty => unreachable!(),
            };
            ctx.part_mut(TmpDataP).resolved.push(own_antecedent);

            let mut next_lits = vec![];
            for &lit in lits.iter() {
                if ctx.part(AssignmentP).lit_is_false(lit)
                    && !ctx.part(ImplGraphP).is_assumption(lit.var())
                {
                    let reason = *ctx.part(ImplGraphP).reason(lit.var());
                    debug_assert!(!reason.is_none());
                    ctx.part_mut(TmpDataP)
                        .resolved
                        .push(Antecedent::of_reason(!lit, &reason));
                } else {
                    next_lits.push(lit);
                }
            }

            debug_assert!(ctx.part(TmpDataP).resolved.len() >= 2);

            ctx.part_mut(TmpDataP).lits = next_lits;
            learned = true;
            continue;
        }

        // A unit clause assigns its free literal.
        if num_true == 0 && num_undef == 1 {
            let unit_lit = *lits
                .iter()
                .find(|&&lit| ctx.part(AssignmentP).lit_is_unk(lit))
                .unwrap();

            let reason = match added {
                AddedClause::Unit { id, .. } => Reason::Unit(id),
                AddedClause::Binary(pair) => {
                    let other = if pair[0] == unit_lit { pair[1] } else { pair[0] };
                    Reason::Binary([other])
                }
                AddedClause::Long(cref) => Reason::Long(cref),
                AddedClause::Empty => unreachable!(),
            };

            assign(ctx.borrow(), unit_lit, reason);
        }

        // A falsified clause becomes the pending conflict.
        if num_false == size
            && ctx.part(SolverStateP).conflict.is_none()
            && ctx.part(IncrementalP).failed_assumption().is_none()
        {
            let conflict = match added {
                AddedClause::Binary(pair) => Some(Conflict::Binary(pair)),
                AddedClause::Long(cref) => Some(Conflict::Long(cref)),
                _ => None,
            };
            ctx.part_mut(SolverStateP).conflict = conflict;
        }

        return added;
    }
}

/// Sort the literals of a new long clause so the two best watch candidates
/// land in the watched positions: unassigned literals first (more recently
/// imported variables leading), then assigned ones by rising activity,
/// falling level and rising index.
fn sort_staged(
    ctx: partial!(Context, AssignmentP, ImplGraphP, VsidsP),
    lits: &mut [Lit],
) {
    let assignment = ctx.part(AssignmentP);
    let impl_graph = ctx.part(ImplGraphP);
    let vsids = ctx.part(VsidsP);

    lits.sort_unstable_by(|&a, &b| {
        match (assignment.lit_is_unk(a), assignment.lit_is_unk(b)) {
            (true, true) => b.code().cmp(&a.code()),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => vsids
                .score(a.var())
                .cmp(&vsids.score(b.var()))
                .then(impl_graph.level(b.var()).cmp(&impl_graph.level(a.var())))
                .then(a.index().cmp(&b.index())),
        }
    });
}
