//! Incremental solving.
use partial_ref::{partial, PartialRef};

use tracsat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::prop::{assign_assumption, undo, unassign_from_trail};
use crate::state::SatState;

/// An assumed literal together with its trail position.
///
/// The position stays unset until the assumption actually assigns a literal;
/// assumptions that are already implied never make it onto the trail.
#[derive(Copy, Clone, Debug)]
pub struct Assumption {
    pub lit: Lit,
    pub trail_pos: Option<usize>,
}

/// Assumption queue and incremental state.
#[derive(Default)]
pub struct Incremental {
    /// All assumptions of the next solve; the prefix up to `head` has been
    /// consumed.
    assumptions: Vec<Assumption>,
    head: usize,
    failed_assumption: Option<Lit>,

    /// Number of assigned assumptions over the solver's lifetime.
    pub assumed: u64,
    /// Number of solve calls.
    pub calls: u64,
}

impl Incremental {
    /// Queue an assumption for the next solve.
    pub fn assume(&mut self, lit: Lit) {
        self.assumptions.push(Assumption {
            lit,
            trail_pos: None,
        });
    }

    /// The queued assumptions.
    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }

    /// Whether assumptions are still waiting to be assigned.
    pub fn has_pending(&self) -> bool {
        self.head < self.assumptions.len()
    }

    /// The first assumption that was found falsified, making the formula
    /// unsatisfiable under the current assumptions.
    pub fn failed_assumption(&self) -> Option<Lit> {
        self.failed_assumption
    }

    pub fn set_failed_assumption(&mut self, lit: Lit) {
        debug_assert!(self.failed_assumption.is_none());
        self.failed_assumption = Some(lit);
    }
}

/// Consume the pending assumptions, assigning them at level 0.
///
/// Returns false when a pending assumption is already false, in which case
/// the formula is unsatisfiable under the assumptions. Already true
/// assumptions are skipped.
pub fn assume_decide(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut IncrementalP,
        mut TrailP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).level(), 0);

    while ctx.part(IncrementalP).has_pending() {
        let head = ctx.part(IncrementalP).head;
        let lit = ctx.part(IncrementalP).assumptions[head].lit;

        if ctx.part(AssignmentP).lit_is_false(lit) {
            return false;
        }

        ctx.part_mut(IncrementalP).head += 1;

        if ctx.part(AssignmentP).lit_is_true(lit) {
            continue;
        }

        let pos = ctx.part(TrailP).len();
        ctx.part_mut(IncrementalP).assumptions[head].trail_pos = Some(pos);
        assign_assumption(ctx.borrow(), lit);
        ctx.part_mut(IncrementalP).assumed += 1;
    }

    true
}

/// Record the first assumption falsified by the current assignment.
pub fn find_failed_assumption(
    mut ctx: partial!(Context, mut IncrementalP, AssignmentP),
) {
    if ctx.part(IncrementalP).failed_assumption.is_some() {
        return;
    }

    let failed = {
        let assignment = ctx.part(AssignmentP);
        ctx.part(IncrementalP)
            .assumptions
            .iter()
            .map(|assumption| assumption.lit)
            .find(|&lit| assignment.lit_is_false(lit))
    };

    if let Some(lit) = failed {
        ctx.part_mut(IncrementalP).failed_assumption = Some(lit);
    }
}

/// Reset the incremental state between solve calls.
///
/// Undoes all decisions, strips the assumptions and everything derived from
/// them off the trail, discards the assumption queue and clears the failed
/// assumption and any pending conflict. A permanently unsatisfiable formula
/// stays unsatisfiable; all other states go back to unknown.
pub fn reset_incremental_usage(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
    ),
) {
    if !ctx.part(SolverStateP).solution_valid {
        return;
    }

    undo(ctx.borrow(), 0);

    let first_assigned = ctx
        .part(IncrementalP)
        .assumptions
        .iter()
        .find_map(|assumption| assumption.trail_pos);

    if let Some(pos) = first_assigned {
        unassign_from_trail(ctx.borrow(), pos);
    }

    {
        let incremental = ctx.part_mut(IncrementalP);
        incremental.assumptions.clear();
        incremental.head = 0;
        incremental.failed_assumption = None;
    }

    let state = ctx.part_mut(SolverStateP);
    state.conflict = None;
    state.solution_valid = false;
    state.sat_state = match state.sat_state {
        SatState::Unsat => SatState::Unsat,
        _ => SatState::Unknown,
    };
}
