//! Learns a new clause by analyzing a conflict.
use partial_ref::{partial, PartialRef};

use tracsat_formula::{Lit, Var};

use crate::clause::activity::bump_clause_activity;
use crate::context::{parts::*, Context};
use crate::prop::assignment::copy_reason_lits;
use crate::prop::Conflict;
use crate::tmp::Antecedent;

/// Temporaries for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// Variables marked during analysis, in marking order.
    marked: Vec<Var>,
    /// Lowest decision level seen in the first UIP cut.
    min_level: usize,
}

/// Learns a new clause by analyzing a conflict.
///
/// The learned clause's literals are left in the staging buffer and its
/// antecedents in the resolved buffer, ready to be added as a simplified
/// clause. The caller backjumps to the level returned by
/// [`drive`](crate::analyze_conflict::drive) and adds the clause.
///
/// The analysis proceeds in phases:
///
/// 1. Resolve backwards from the conflict through the reasons of marked
///    variables until only one variable of the conflict level remains, the
///    first UIP. All touched variables are marked and have their activity
///    bumped, and the lowest level in the cut is tracked.
/// 2. Self-subsuming minimization: a breadth-first search through the reasons
///    of each marked variable. When the search only reaches other marked
///    variables the start variable is redundant; when it reaches a variable
///    without a reason or below the cut's lowest level it is not, and the
///    marks added by this search are rolled back.
/// 3. Emit the clause: the false literal of every marked variable whose
///    reason is not fully marked; fully explained variables contribute their
///    reason as an antecedent instead.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VsidsP,
        AssignmentP,
        ClauseActivityP,
        TrailP,
    ),
    conflict: Conflict,
) {
    let level = ctx.part(TrailP).level();

    debug_assert!(ctx.part(AnalyzeConflictP).marked.is_empty());
    debug_assert!(ctx.part(TmpDataP).lits.is_empty());
    debug_assert!(ctx.part(TmpDataP).resolved.is_empty());

    ctx.part_mut(AnalyzeConflictP).min_level = level;

    // Search for the first UIP, marking all resolved variables.
    let mut open = 0usize;
    let mut uip = None;

    let mut clause_lits = conflict_lits(ctx.borrow(), conflict);
    let mut this: Option<Lit> = None;
    let mut pos = ctx.part(TrailP).len();

    'sweep: loop {
        for &other in clause_lits.iter() {
            if Some(other) == this {
                continue;
            }

            let var = other.var();
            if ctx.part(ImplGraphP).is_marked(var) {
                continue;
            }

            ctx.part_mut(ImplGraphP).set_mark(var, true);
            ctx.part_mut(AnalyzeConflictP).marked.push(var);
            ctx.part_mut(VsidsP).bump(var);

            let var_level = ctx.part(ImplGraphP).level(var);
            if var_level == level {
                open += 1;
            } else if var_level < ctx.part(AnalyzeConflictP).min_level {
                ctx.part_mut(AnalyzeConflictP).min_level = var_level;
            }
        }

        let lit = loop {
            if pos == 0 {
                break 'sweep;
            }
            pos -= 1;
            let lit = ctx.part(TrailP).trail()[pos];
            if ctx.part(ImplGraphP).is_marked(lit.var()) {
                break lit;
            }
        };

        let var = lit.var();
        let reason = *ctx.part(ImplGraphP).reason(var);

        open -= 1;
        if open == 0 {
            uip = Some(var);
            if level > 0 {
                break;
            }
        }

        if reason.is_none() {
            break;
        }

        this = Some(lit);
        clause_lits = copy_reason_lits(ctx.borrow(), lit, &reason);
    }

    minimize_cut(ctx.borrow(), uip);

    emit_clause(ctx.borrow(), conflict);

    // Reset all marks.
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    for var in analyze.marked.drain(..) {
        ctx.part_mut(ImplGraphP).set_mark(var, false);
    }

    // Bump the activity of every long antecedent.
    let (tmp, mut ctx) = ctx.split_part(TmpDataP);
    for antecedent in tmp.resolved.iter() {
        if let Antecedent::Long(cref) = *antecedent {
            bump_clause_activity(ctx.borrow(), cref);
        }
    }
}

/// The conflicting clause's literals as an owned buffer.
fn conflict_lits(ctx: partial!(Context, ClauseAllocP), conflict: Conflict) -> Vec<Lit> {
    match conflict {
        Conflict::Binary(lits) => lits.to_vec(),
        Conflict::Long(cref) => ctx.part(ClauseAllocP).clause(cref).lits().to_vec(),
    }
}

/// The literal of `var` that is currently assigned true.
fn true_lit(ctx: partial!(Context, AssignmentP), var: Var) -> Lit {
    debug_assert!(ctx.part(AssignmentP).var_value(var).is_some());
    var.lit(ctx.part(AssignmentP).var_value(var) == Some(true))
}

/// Mark further intermediate variables to shrink the learned clause.
///
/// A breadth-first search backwards through the implication graph from each
/// marked variable. Redundant closures stay marked so later searches and the
/// emission phase can use them; failed closures are rolled back so they do
/// not spoil other minimizations.
fn minimize_cut(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ImplGraphP,
        ClauseAllocP,
        AssignmentP,
    ),
    uip: Option<Var>,
) {
    let min_level = ctx.part(AnalyzeConflictP).min_level;
    let original = ctx.part(AnalyzeConflictP).marked.len();

    for index in 0..original {
        let start = ctx.part(AnalyzeConflictP).marked[index];

        if Some(start) == uip {
            continue;
        }

        let start_reason = *ctx.part(ImplGraphP).reason(start);
        if start_reason.is_none() {
            continue;
        }

        let rollback_to = ctx.part(AnalyzeConflictP).marked.len();

        let start_lit = true_lit(ctx.borrow(), start);
        let lits = copy_reason_lits(ctx.borrow(), start_lit, &start_reason);
        for &lit in lits.iter() {
            mark_new(ctx.borrow(), lit.var());
        }

        let mut next = rollback_to;
        'closure: while next < ctx.part(AnalyzeConflictP).marked.len() {
            let var = ctx.part(AnalyzeConflictP).marked[next];
            next += 1;

            let reason = *ctx.part(ImplGraphP).reason(var);
            if reason.is_none() || ctx.part(ImplGraphP).level(var) < min_level {
                // The start variable is not redundant. Roll back the marks of
                // this search only.
                while ctx.part(AnalyzeConflictP).marked.len() > rollback_to {
                    let var = ctx.part_mut(AnalyzeConflictP).marked.pop().unwrap();
                    ctx.part_mut(ImplGraphP).set_mark(var, false);
                }
                break 'closure;
            }

            let var_lit = true_lit(ctx.borrow(), var);
            let lits = copy_reason_lits(ctx.borrow(), var_lit, &reason);
            for &lit in lits.iter() {
                mark_new(ctx.borrow(), lit.var());
            }
        }
    }
}

fn mark_new(
    mut ctx: partial!(Context, mut AnalyzeConflictP, mut ImplGraphP),
    var: Var,
) {
    if !ctx.part(ImplGraphP).is_marked(var) {
        ctx.part_mut(ImplGraphP).set_mark(var, true);
        ctx.part_mut(AnalyzeConflictP).marked.push(var);
    }
}

/// Emit the learned clause and collect its antecedents.
///
/// A marked variable whose reason literals are all marked is explained by the
/// other marked variables: its reason becomes an antecedent and no literal is
/// emitted. All remaining marked variables contribute their false literal.
fn emit_clause(
    mut ctx: partial!(
        Context,
        mut TmpDataP,
        AnalyzeConflictP,
        AssignmentP,
        ClauseAllocP,
        ImplGraphP,
    ),
    conflict: Conflict,
) {
    ctx.part_mut(TmpDataP).resolved.push(conflict.into());

    for index in 0..ctx.part(AnalyzeConflictP).marked.len() {
        let var = ctx.part(AnalyzeConflictP).marked[index];
        let reason = *ctx.part(ImplGraphP).reason(var);

        let var_lit = true_lit(ctx.borrow(), var);

        if !reason.is_none() {
            let lits = copy_reason_lits(ctx.borrow(), var_lit, &reason);
            if lits
                .iter()
                .all(|&lit| ctx.part(ImplGraphP).is_marked(lit.var()))
            {
                let antecedent = Antecedent::of_reason(var_lit, &reason);
                ctx.part_mut(TmpDataP).resolved.push(antecedent);
                continue;
            }
        }

        ctx.part_mut(TmpDataP).lits.push(!var_lit);
    }
}

/// The backjump level for the staged learned clause.
///
/// This is the second-highest decision level among the clause's literals, or
/// zero for unit and empty clauses.
pub fn drive(ctx: partial!(Context, ImplGraphP, TmpDataP)) -> usize {
    let impl_graph = ctx.part(ImplGraphP);
    let lits = &ctx.part(TmpDataP).lits;

    let mut first = 0;
    for &lit in lits.iter() {
        first = first.max(impl_graph.level(lit.var()));
    }

    let mut second = 0;
    for &lit in lits.iter() {
        let level = impl_graph.level(lit.var());
        if level != first {
            second = second.max(level);
        }
    }

    second
}
