//! Conflict driven clause learning.

use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::{analyze_conflict, drive};
use crate::context::{parts::*, Context};
use crate::load::add_simplified_clause;
use crate::prop::undo;

/// Turn the pending conflict into a learned clause and backjump.
///
/// The learned first UIP clause is staged by the analysis, the solver
/// backjumps to the second-highest level among its literals and the clause is
/// added, which also asserts the UIP with the new clause as its reason. A
/// conflict without decisions derives the empty clause and makes the formula
/// unsatisfiable.
pub fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut JwWeightsP,
        mut ProofP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        ClauseActivityP,
    ),
) {
    let conflict = ctx
        .part_mut(SolverStateP)
        .conflict
        .take()
        .expect("conflict_step without a pending conflict");

    ctx.part_mut(ScheduleP).conflicts += 1;

    analyze_conflict(ctx.borrow(), conflict);

    let backjump_level = drive(ctx.borrow());
    undo(ctx.borrow(), backjump_level);

    add_simplified_clause(ctx.borrow(), true);
}

#[cfg(test)]
mod tests {
    use partial_ref::{IntoPartialRefMut, PartialRef};

    use proptest::prelude::*;

    use tracsat_formula::{cnf_formula, test::*};

    use crate::context::{ensure_var_count, parts::*, Context};
    use crate::load::simplify_and_add_clause;
    use crate::prop::propagate;
    use crate::state::SatState;

    use super::*;

    fn load_and_propagate(ctx: &mut Context, clause: &[tracsat_formula::Lit]) {
        let mut ctx = ctx.into_partial_ref_mut();
        ctx.part_mut(TmpDataP).lits.extend_from_slice(clause);
        simplify_and_add_clause(ctx.borrow(), false);
        if ctx.part(SolverStateP).conflict.is_none() {
            propagate(ctx.borrow());
        }
    }

    fn run_to_fixpoint(ctx: &mut Context) -> SatState {
        let mut ctx = ctx.into_partial_ref_mut();
        loop {
            match ctx.part(SolverStateP).sat_state {
                SatState::Unknown => (),
                state => return state,
            }

            propagate(ctx.borrow());

            if ctx.part(SolverStateP).conflict.is_some() {
                conflict_step(ctx.borrow());
                continue;
            }

            if ctx.part(TrailP).len() == ctx.part(VariablesP).count() {
                ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
                continue;
            }

            // Cheap stand-in for the decision heuristic: pick the first
            // unassigned variable.
            let unassigned = (0..ctx.part(VariablesP).count())
                .map(tracsat_formula::Var::from_index)
                .find(|&var| ctx.part(AssignmentP).var_value(var).is_none())
                .unwrap();
            crate::prop::assign_decision(ctx.borrow(), unassigned.positive());
        }
    }

    fn load_formula(ctx: &mut Context, formula: &tracsat_formula::CnfFormula) {
        {
            let mut ctx = (&mut *ctx).into_partial_ref_mut();
            ensure_var_count(ctx.borrow(), formula.var_count());
        }
        for clause in formula.iter() {
            load_and_propagate(ctx, clause);
        }
    }

    #[test]
    fn level_0_unsat() {
        let mut ctx = Context::default();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        load_formula(&mut ctx, &formula);

        assert_eq!(run_to_fixpoint(&mut ctx), SatState::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
            let mut ctx = Context::default();

            load_formula(&mut ctx, &formula);

            prop_assert_eq!(run_to_fixpoint(&mut ctx), SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();

            load_formula(&mut ctx, &formula);

            prop_assert_eq!(run_to_fixpoint(&mut ctx), SatState::Sat);

            let ctx = ctx.into_partial_ref_mut();
            for clause in formula.iter() {
                prop_assert!(clause
                    .iter()
                    .any(|&lit| ctx.part(AssignmentP).lit_is_true(lit)));
            }
        }
    }
}
