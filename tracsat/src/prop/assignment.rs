//! Partial assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use tracsat_formula::lit::LitIdx;
use tracsat_formula::{Lit, Var};

use crate::clause::db::{lock_reason, unlock_reason};
use crate::context::{parts::*, Context};
use crate::load::{add_simplified_clause, AddedClause};
use crate::tmp::Antecedent;

use super::Reason;

/// Maximum supported decision level.
pub const MAX_LEVEL: usize = 1 << 27;

/// Current partial assignment.
#[derive(Default)]
pub struct Assignment {
    assignment: Vec<Option<bool>>,
    last_phase: Vec<bool>,
    has_phase: Vec<bool>,
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.assignment.resize(count, None);
        self.last_phase.resize(count, false);
        self.has_phase.resize(count, false);
    }

    /// Current partial assignment as slice.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.assignment[lit.index()] == Some(lit.is_positive())
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        self.assignment[lit.index()] == Some(lit.is_negative())
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        self.assignment[lit.index()].is_none()
    }

    pub fn assign_lit(&mut self, lit: Lit) {
        self.assignment[lit.index()] = Some(lit.is_positive())
    }

    pub fn unassign_var(&mut self, var: Var) {
        self.assignment[var.index()] = None;
    }

    /// Remember the polarity of an assignment for phase saving.
    pub fn save_phase(&mut self, lit: Lit) {
        self.last_phase[lit.index()] = lit.is_positive();
        self.has_phase[lit.index()] = true;
    }

    /// Polarity of the last saved assignment, if any.
    pub fn saved_phase(&self, var: Var) -> Option<bool> {
        if self.has_phase[var.index()] {
            Some(self.last_phase[var.index()])
        } else {
            None
        }
    }

    /// Heap memory used by the assignment.
    pub fn heap_bytes(&self) -> usize {
        self.assignment.capacity() * std::mem::size_of::<Option<bool>>()
            + self.last_phase.capacity()
            + self.has_phase.capacity()
    }
}

/// Assignment history and propagation queues.
///
/// Two cursors lag behind the head of the trail: the binary cursor feeds the
/// binary implication scan and the long cursor the watchlist scan. Binary
/// propagation is preferred, so the binary cursor is drained first.
#[derive(Default)]
pub struct Trail {
    trail: Vec<Lit>,
    binary_head: usize,
    long_head: usize,
    level: usize,
    /// Top level assignments outside of assumptions.
    pub fixed: usize,
    pub propagations: u64,
}

impl Trail {
    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    /// Current decision level.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    pub fn push(&mut self, lit: Lit) {
        self.trail.push(lit);
    }

    pub fn top(&self) -> Option<Lit> {
        self.trail.last().cloned()
    }

    pub fn pop(&mut self) -> Option<Lit> {
        self.trail.pop()
    }

    /// Next literal whose binary implications still need to be scanned.
    pub fn pop_binary_queue(&mut self) -> Option<Lit> {
        if self.binary_head < self.trail.len() {
            let lit = self.trail[self.binary_head];
            self.binary_head += 1;
            self.propagations += 1;
            Some(lit)
        } else {
            None
        }
    }

    /// Next literal whose watched clauses still need to be scanned.
    ///
    /// Only yields literals already processed by the binary queue.
    pub fn pop_long_queue(&mut self) -> Option<Lit> {
        if self.long_head < self.binary_head {
            let lit = self.trail[self.long_head];
            self.long_head += 1;
            Some(lit)
        } else {
            None
        }
    }

    /// Whether all assignments have been propagated.
    pub fn fully_propagated(&self) -> bool {
        self.binary_head == self.trail.len() && self.long_head == self.trail.len()
    }

    /// Move both cursors to the head, dropping unpropagated assignments from
    /// the queues.
    pub fn reset_queues(&mut self) {
        self.binary_head = self.trail.len();
        self.long_head = self.trail.len();
    }

    /// Truncate the trail, keeping the queues consistent.
    fn truncate(&mut self, len: usize) {
        self.trail.truncate(len);
        self.binary_head = self.binary_head.min(len);
        self.long_head = self.long_head.min(len);
    }

    /// Heap memory used by the trail.
    pub fn heap_bytes(&self) -> usize {
        self.trail.capacity() * std::mem::size_of::<Lit>()
    }
}

/// Assign a literal as unit implication or propagation.
///
/// At level 0 with a multi-literal reason, the reason is first resolved
/// against the reasons of its false non-assumption literals, deriving the
/// matching unit clause (or its assumption-weakened form). This keeps every
/// fixed non-assumption variable explained by a unit clause, which the
/// creation time simplification of clauses and the proof trace rely on.
pub fn assign(
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
    reason: Reason,
) {
    debug_assert!(ctx.part(AssignmentP).lit_is_unk(lit));

    let level = ctx.part(TrailP).level();

    {
        let assignment = ctx.part_mut(AssignmentP);
        assignment.assign_lit(lit);
        assignment.save_phase(lit);
    }

    {
        let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
        node.reason = reason;
        node.level = level as LitIdx;
        node.assumption = false;
    }

    let mut reason = reason;
    if level == 0 {
        reason = derive_top_level_reason(ctx.borrow(), lit, reason);
        ctx.part_mut(ImplGraphP).update_reason(lit.var(), reason);
    }

    lock_reason(ctx.borrow(), &reason);

    let mut assumption = false;
    if level == 0 && !reason.is_none() {
        let reason_lits = copy_reason_lits(ctx.borrow(), lit, &reason);
        for other in reason_lits {
            if other.var() != lit.var() && ctx.part(ImplGraphP).is_assumption(other.var()) {
                assumption = true;
                break;
            }
        }
        if assumption {
            ctx.part_mut(ImplGraphP).nodes[lit.index()].assumption = true;
        }
    }

    ctx.part_mut(TrailP).push(lit);

    if level == 0 && !assumption {
        ctx.part_mut(TrailP).fixed += 1;

        // Top level true literals can never be falsified again, so their
        // watch and implication lists are dead weight.
        ctx.part_mut(WatchlistsP).clear(lit);
        ctx.part_mut(BinaryClausesP).clear(lit);
    }
}

/// The literals of a reason clause, including the assigned literal for binary
/// reasons, as an owned buffer.
pub(crate) fn copy_reason_lits(
    ctx: partial!(Context, ClauseAllocP),
    lit: Lit,
    reason: &Reason,
) -> Vec<Lit> {
    match *reason {
        Reason::None | Reason::Unit(_) => vec![],
        Reason::Binary([other]) => vec![lit, other],
        Reason::Long(cref) => ctx.part(ClauseAllocP).clause(cref).lits().to_vec(),
    }
}

/// Resolve a level 0 reason into the unit clause it implies.
///
/// Keeps the original reason when it is already a unit or when all other
/// literals are assumptions.
fn derive_top_level_reason(
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
    reason: Reason,
) -> Reason {
    let reason_lits = copy_reason_lits(ctx.borrow(), lit, &reason);
    if reason_lits.len() <= 1 {
        return reason;
    }

    debug_assert!(ctx.part(TmpDataP).lits.is_empty());
    debug_assert!(ctx.part(TmpDataP).resolved.is_empty());

    {
        let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
        let impl_graph = ctx.part(ImplGraphP);

        tmp.lits.push(lit);
        tmp.resolved.push(Antecedent::of_reason(lit, &reason));

        for &other in reason_lits.iter() {
            if other.var() == lit.var() {
                continue;
            }

            if impl_graph.is_assumption(other.var()) {
                tmp.lits.push(other);
            } else {
                let other_reason = impl_graph.reason(other.var());
                debug_assert!(!other_reason.is_none());
                tmp.resolved
                    .push(Antecedent::of_reason(!other, other_reason));
            }
        }
    }

    if ctx.part(TmpDataP).resolved.len() > 1 {
        match add_simplified_clause(ctx.borrow(), true) {
            AddedClause::Unit { id, .. } => Reason::Unit(id),
            AddedClause::Binary(lits) => {
                let other = if lits[0] == lit { lits[1] } else { lits[0] };
                Reason::Binary([other])
            }
            AddedClause::Long(cref) => Reason::Long(cref),
            AddedClause::Empty => reason,
        }
    } else {
        let tmp = ctx.part_mut(TmpDataP);
        tmp.lits.clear();
        tmp.resolved.clear();
        reason
    }
}

/// Assign a decision literal, opening a new decision level.
pub fn assign_decision(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
) {
    debug_assert!(ctx.part(AssignmentP).lit_is_unk(lit));

    let trail = ctx.part_mut(TrailP);
    trail.set_level(trail.level() + 1);
    let level = trail.level();
    assert!(level < MAX_LEVEL, "maximum decision level reached");

    ctx.part_mut(AssignmentP).assign_lit(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = Reason::None;
    node.level = level as LitIdx;
    node.assumption = false;

    ctx.part_mut(TrailP).push(lit);
}

/// Assign an assumption at level 0.
///
/// Assumptions are not decisions: the decision level stays 0, but the
/// variable is flagged so it is distinguishable from derived units and can be
/// unassigned between solve calls.
pub fn assign_assumption(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
) {
    debug_assert_eq!(ctx.part(TrailP).level(), 0);
    debug_assert!(ctx.part(AssignmentP).lit_is_unk(lit));

    ctx.part_mut(AssignmentP).assign_lit(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = Reason::None;
    node.level = 0;
    node.assumption = true;

    ctx.part_mut(TrailP).push(lit);
}

fn unassign_one(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut VsidsP,
    ),
    lit: Lit,
) {
    let reason = *ctx.part(ImplGraphP).reason(lit.var());
    unlock_reason(ctx.borrow(), &reason);

    ctx.part_mut(ImplGraphP).nodes[lit.index()].assumption = false;
    ctx.part_mut(AssignmentP).unassign_var(lit.var());
    ctx.part_mut(VsidsP).make_available(lit.var());
}

/// Undo all assignments in decision levels deeper than the given level.
///
/// Level 0 assignments, including assumptions, survive. Any pending conflict
/// is dropped.
pub fn undo(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
    ),
    target_level: usize,
) {
    loop {
        let lit = match ctx.part(TrailP).top() {
            Some(lit) => lit,
            None => break,
        };

        if ctx.part(ImplGraphP).level(lit.var()) <= target_level {
            break;
        }

        ctx.part_mut(TrailP).pop();
        unassign_one(ctx.borrow(), lit);
    }

    let trail = ctx.part_mut(TrailP);
    trail.set_level(target_level);
    trail.reset_queues();

    ctx.part_mut(SolverStateP).conflict = None;
}

/// Remove all assumption tainted literals from the trail, starting at the
/// given position.
///
/// Used between solve calls; requires the solver to be at level 0.
pub fn unassign_from_trail(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut VsidsP,
    ),
    start: usize,
) {
    debug_assert_eq!(ctx.part(TrailP).level(), 0);

    let mut kept = start;
    for pos in start..ctx.part(TrailP).len() {
        let lit = ctx.part(TrailP).trail()[pos];
        if ctx.part(ImplGraphP).is_assumption(lit.var()) {
            unassign_one(ctx.borrow(), lit);
        } else {
            let trail = ctx.part_mut(TrailP);
            trail.trail[kept] = trail.trail[pos];
            kept += 1;
        }
    }

    let trail = ctx.part_mut(TrailP);
    trail.truncate(kept);
    trail.reset_queues();
}
