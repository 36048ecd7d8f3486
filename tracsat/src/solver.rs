//! Boolean satisfiability solver.
use std::io::{Read, Write};

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::info;

use tracsat_dimacs::DimacsParser;
use tracsat_formula::{CnfFormula, Lit, Var};

use crate::config::SolverConfig;
use crate::context::{ensure_var_count, parts::*, Context};
use crate::incremental::reset_incremental_usage;
use crate::load::simplify_and_add_clause;
use crate::proof;
use crate::prop::propagate;
use crate::schedule::search;
use crate::state::SatState;

/// Outcome of a solve call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolverResult {
    Sat,
    Unsat,
    Unknown,
}

impl SolverResult {
    /// The conventional SAT solver exit code: 10, 20 or 0.
    pub fn exit_code(self) -> i32 {
        match self {
            SolverResult::Sat => 10,
            SolverResult::Unsat => 20,
            SolverResult::Unknown => 0,
        }
    }
}

/// Statistics snapshot of a solver.
#[derive(Copy, Clone, Default, Debug)]
pub struct SolverStats {
    pub calls: u64,
    pub conflicts: u64,
    pub decisions: u64,
    pub random_decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub iterations: u64,
    pub reductions: u64,
    pub forced_reductions: u64,
    pub simplifications: u64,
    pub assumed: u64,
    pub fixed: usize,
    pub original_clauses: usize,
    pub learned_clauses: usize,
}

/// An incremental CDCL SAT solver with unsat core and proof trace extraction.
///
/// One `Solver` value owns all solver state; dropping it releases everything.
/// Clauses are fed either literal by literal in the zero terminated integer
/// convention of [`add`](Solver::add), or as whole slices of [`Lit`] values.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Enable proof trace generation.
    ///
    /// Has to be called before the first clause is added.
    pub fn enable_trace_generation(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        assert!(
            ctx.part(ClauseDbP).added_clauses() == 0,
            "trace generation enabled after adding clauses"
        );
        ctx.part_mut(ProofP).enable();
    }

    /// Seed the random decision generator.
    pub fn set_seed(&mut self, seed: u32) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ScheduleP).set_seed(seed);
    }

    /// The solver configuration.
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.ctx.solver_config
    }

    fn import_var(&mut self, var: Var) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), var.index() + 1);
    }

    /// Append a literal to the clause under construction.
    ///
    /// The 1-based integer convention of DIMACS is used; `0` terminates the
    /// clause and adds it to the formula. Variables are created as needed.
    pub fn add(&mut self, int_lit: i32) {
        self.ctx.solver_state.enter();
        {
            let mut ctx = self.ctx.into_partial_ref_mut();
            reset_incremental_usage(ctx.borrow());
        }

        if int_lit == 0 {
            let mut ctx = self.ctx.into_partial_ref_mut();
            simplify_and_add_clause(ctx.borrow(), false);
            if ctx.part(SolverStateP).conflict.is_none() {
                propagate(ctx.borrow());
            }
        } else {
            assert!(
                int_lit != i32::min_value() && (int_lit.abs() as usize) <= Var::max_count(),
                "literal index out of range"
            );
            let lit = Lit::from_dimacs(int_lit as isize);
            self.import_var(lit.var());
            self.ctx.tmp_data.lits.push(lit);
        }

        self.ctx.solver_state.leave();
    }

    /// Add a clause given as a slice of literals.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        self.ctx.solver_state.enter();

        let max_index = lits.iter().map(|lit| lit.index() + 1).max().unwrap_or(0);

        let mut ctx = self.ctx.into_partial_ref_mut();
        reset_incremental_usage(ctx.borrow());
        ensure_var_count(ctx.borrow(), max_index);

        debug_assert!(ctx.part(TmpDataP).lits.is_empty());
        ctx.part_mut(TmpDataP).lits.extend_from_slice(lits);
        simplify_and_add_clause(ctx.borrow(), false);
        if ctx.part(SolverStateP).conflict.is_none() {
            propagate(ctx.borrow());
        }

        self.ctx.solver_state.leave();
    }

    /// Add a whole formula.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        for clause in formula.iter() {
            self.add_clause(clause);
        }
        if formula.var_count() > 0 {
            self.import_var(Var::from_index(formula.var_count() - 1));
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`] for the whole
    /// input.
    pub fn add_dimacs_cnf(&mut self, input: impl Read) -> Result<(), Error> {
        let parser = DimacsParser::parse_incremental(input, |parser| {
            self.add_formula(&parser.take_formula());
            Ok(())
        })?;

        info!(
            "Parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Assume a literal for the next solve.
    ///
    /// Assumptions are fixed during the solve but discarded afterwards.
    pub fn assume(&mut self, int_lit: i32) {
        assert!(
            int_lit != 0
                && int_lit != i32::min_value()
                && (int_lit.abs() as usize) <= Var::max_count(),
            "literal index out of range"
        );
        self.assume_lit(Lit::from_dimacs(int_lit as isize));
    }

    /// Assume a literal given as a [`Lit`] value.
    pub fn assume_lit(&mut self, lit: Lit) {
        {
            let mut ctx = self.ctx.into_partial_ref_mut();
            reset_incremental_usage(ctx.borrow());
        }
        self.import_var(lit.var());
        self.ctx.incremental.assume(lit);
    }

    /// Check the satisfiability of the current formula under the queued
    /// assumptions.
    pub fn solve(&mut self) -> SolverResult {
        self.solve_limited(-1)
    }

    /// Like [`solve`](Solver::solve), but gives up after the given number of
    /// decisions. A negative limit means no limit.
    ///
    /// On `Unknown` all internal state stays intact, so a later call resumes
    /// the search with everything learned so far.
    pub fn solve_limited(&mut self, decision_limit: i64) -> SolverResult {
        assert!(
            self.ctx.tmp_data.lits.is_empty(),
            "added clause not complete"
        );

        self.ctx.solver_state.enter();
        self.ctx.incremental.calls += 1;

        let limit = if decision_limit < 0 {
            None
        } else {
            Some(decision_limit as u64)
        };

        let result = {
            let mut ctx = self.ctx.into_partial_ref_mut();
            reset_incremental_usage(ctx.borrow());

            search(ctx.borrow(), limit);

            ctx.part_mut(SolverStateP).solution_valid = true;

            match ctx.part(SolverStateP).sat_state {
                SatState::Sat => SolverResult::Sat,
                SatState::Unsat | SatState::UnsatUnderAssumptions => SolverResult::Unsat,
                SatState::Unknown => SolverResult::Unknown,
            }
        };

        self.ctx.solver_state.leave();
        result
    }

    /// Value of a literal in the last solve's assignment.
    ///
    /// Returns `1` when the literal is true, `-1` when it is false and `0`
    /// when it is unassigned. Literals of variables the solver has never seen
    /// yield `-1`.
    ///
    /// Only valid after a solve call and before the next clause or assumption
    /// is added.
    pub fn value(&self, int_lit: i32) -> i32 {
        assert!(
            self.ctx.solver_state.solution_valid,
            "assignment is not valid, solve first"
        );
        assert!(
            int_lit != 0 && int_lit != i32::min_value(),
            "literal index out of range"
        );

        let ctx = self.ctx.into_partial_ref();

        let index = int_lit.abs() as usize - 1;
        if index >= ctx.part(VariablesP).count() {
            return -1;
        }

        let lit = Lit::from_dimacs(int_lit as isize);
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => 1,
            Some(false) => -1,
            None => 0,
        }
    }

    /// Set of literals that satisfy the formula.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return None;
        }
        Some(
            ctx.part(AssignmentP)
                .assignment()
                .iter()
                .enumerate()
                .flat_map(|(index, assignment)| {
                    assignment.map(|polarity| Lit::from_index(index, polarity))
                })
                .collect(),
        )
    }

    /// The first assumption found falsified when the last solve returned
    /// unsat under assumptions.
    pub fn failed_assumption(&self) -> Option<Lit> {
        self.ctx.incremental.failed_assumption()
    }

    /// Write the resolution trace of the last unsatisfiability result.
    ///
    /// Requires trace generation to have been enabled before any clause was
    /// added and the last solve to have returned unsat.
    pub fn write_trace(&mut self, target: &mut impl Write) -> Result<(), Error> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        proof::write_trace(ctx.borrow(), target)
    }

    /// Write the unsatisfiable core as a DIMACS CNF formula.
    ///
    /// Requires trace generation to have been enabled before any clause was
    /// added and the last solve to have returned unsat.
    pub fn write_core(&mut self, target: &mut impl Write) -> Result<(), Error> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        proof::write_core(ctx.borrow(), target)
    }

    /// Write the current formula in DIMACS CNF format.
    ///
    /// Unit and binary clauses have no clause objects, so they are emitted
    /// from the unit list and the implication lists; together with the stored
    /// long clauses the printed formula has the same verdict as the current
    /// one.
    pub fn write_dimacs(&self, target: &mut impl Write) -> Result<(), Error> {
        let ctx = self.ctx.into_partial_ref();

        let db = ctx.part(ClauseDbP);
        let binary = ctx.part(BinaryClausesP);
        let alloc = ctx.part(ClauseAllocP);

        let long_clauses: Vec<_> = db
            .clauses
            .iter()
            .cloned()
            .filter(|&cref| !alloc.header(cref).deleted())
            .collect();

        let binary_count = binary.iter_clauses().count();
        let empty_count = db.empty_added as usize;

        writeln!(
            target,
            "p cnf {} {}",
            ctx.part(VariablesP).count(),
            empty_count + db.units.len() + binary_count + long_clauses.len()
        )?;

        if db.empty_added {
            target.write_all(b"0\n")?;
        }

        for &lit in db.units.iter() {
            itoa::write(&mut *target, lit.to_dimacs())?;
            target.write_all(b" 0\n")?;
        }

        for pair in binary.iter_clauses() {
            for &lit in pair.iter() {
                itoa::write(&mut *target, lit.to_dimacs())?;
                target.write_all(b" ")?;
            }
            target.write_all(b"0\n")?;
        }

        for cref in long_clauses {
            for &lit in alloc.clause(cref).lits().iter() {
                itoa::write(&mut *target, lit.to_dimacs())?;
                target.write_all(b" ")?;
            }
            target.write_all(b"0\n")?;
        }

        Ok(())
    }

    /// Number of variables known to the solver.
    pub fn num_variables(&self) -> usize {
        self.ctx.variables.count()
    }

    /// Number of non-trivial original clauses added so far.
    pub fn added_original_clauses(&self) -> u64 {
        self.ctx.clause_db.oadded
    }

    /// High water mark of the tracked memory usage.
    pub fn max_bytes_allocated(&self) -> usize {
        let ctx = &self.ctx;
        let bytes = ctx.clause_alloc.heap_bytes()
            + ctx.watchlists.heap_bytes()
            + ctx.binary_clauses.heap_bytes()
            + ctx.impl_graph.heap_bytes()
            + ctx.assignment.heap_bytes()
            + ctx.trail.heap_bytes()
            + ctx.vsids.heap_bytes()
            + ctx.jw_weights.heap_bytes()
            + ctx.proof.heap_bytes();
        bytes.max(ctx.solver_state.max_bytes)
    }

    /// Time spent inside solver entry points.
    pub fn seconds(&self) -> f64 {
        self.ctx.solver_state.seconds
    }

    /// A wall clock time stamp in seconds, for measuring total runtimes.
    pub fn time_stamp() -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Snapshot of the statistics counters.
    pub fn stats(&self) -> SolverStats {
        let schedule = &self.ctx.schedule;
        SolverStats {
            calls: self.ctx.incremental.calls,
            conflicts: schedule.conflicts,
            decisions: schedule.decisions,
            random_decisions: schedule.rdecisions,
            propagations: self.ctx.trail.propagations,
            restarts: schedule.restarts,
            iterations: schedule.iterations,
            reductions: schedule.reductions,
            forced_reductions: schedule.freductions,
            simplifications: schedule.simps,
            assumed: self.ctx.incremental.assumed,
            fixed: self.ctx.trail.fixed,
            original_clauses: self.ctx.clause_db.oclauses,
            learned_clauses: self.ctx.clause_db.lclauses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use tracsat_formula::test::*;

    fn solve_formula(formula: &CnfFormula) -> SolverResult {
        let mut solver = Solver::new();
        solver.add_formula(formula);
        solver.solve()
    }

    #[test]
    fn empty_formula_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert_eq!(solver.num_variables(), 0);
    }

    #[test]
    fn empty_clause_is_unsat() {
        let mut solver = Solver::new();
        solver.add(0);
        assert_eq!(solver.solve(), SolverResult::Unsat);
    }

    #[test]
    fn unit_and_negated_unit_is_unsat() {
        let mut solver = Solver::new();
        solver.add(1);
        solver.add(0);
        solver.add(-1);
        solver.add(0);
        assert_eq!(solver.solve(), SolverResult::Unsat);
        // The conflict is found at the top level, before any decision.
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn tautologies_are_dropped() {
        let mut solver = Solver::new();
        solver.add(1);
        solver.add(-1);
        solver.add(0);
        assert_eq!(solver.added_original_clauses(), 0);
        assert_eq!(solver.solve(), SolverResult::Sat);
    }

    #[test]
    fn duplicate_literals_are_merged() {
        let mut solver = Solver::new();
        solver.add(3);
        solver.add(3);
        solver.add(3);
        solver.add(0);
        assert_eq!(solver.num_variables(), 3);
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert_eq!(solver.value(3), 1);
        assert_eq!(solver.value(-3), -1);
    }

    #[test]
    fn chained_units_propagate() {
        let mut solver = Solver::new();
        for clause in &[&[1][..], &[-1, 2][..], &[-2, 3][..]] {
            for &lit in clause.iter() {
                solver.add(lit);
            }
            solver.add(0);
        }
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert_eq!(solver.value(1), 1);
        assert_eq!(solver.value(2), 1);
        assert_eq!(solver.value(3), 1);
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn all_polarities_of_two_vars_is_unsat() {
        let mut solver = Solver::new();
        for clause in &[[1, 2], [-1, 2], [1, -2], [-1, -2]] {
            for &lit in clause.iter() {
                solver.add(lit);
            }
            solver.add(0);
        }
        assert_eq!(solver.solve(), SolverResult::Unsat);
    }

    #[test]
    fn exactly_one_of_three() {
        let mut solver = Solver::new();
        for clause in &[&[1, 2, 3][..], &[-1, -2][..], &[-2, -3][..], &[-1, -3][..]] {
            for &lit in clause.iter() {
                solver.add(lit);
            }
            solver.add(0);
        }
        assert_eq!(solver.solve(), SolverResult::Sat);

        let true_count = (1..=3).filter(|&v| solver.value(v) == 1).count();
        assert_eq!(true_count, 1);
    }

    #[test]
    fn failed_assumptions_are_reported() {
        let mut solver = Solver::new();
        solver.add(1);
        solver.add(2);
        solver.add(0);
        solver.assume(-1);
        solver.assume(-2);

        assert_eq!(solver.solve(), SolverResult::Unsat);
        let failed = solver.failed_assumption().unwrap().to_dimacs();
        assert!(failed == -1 || failed == -2);

        // Assumptions are discarded after the solve.
        assert_eq!(solver.solve(), SolverResult::Sat);
        assert_eq!(solver.failed_assumption(), None);
    }

    #[test]
    fn decision_limit_preserves_state() {
        let mut solver = Solver::new();
        solver.add_formula(&pigeon_hole_formula(4));

        assert_eq!(solver.solve_limited(0), SolverResult::Unknown);
        assert_eq!(solver.solve(), SolverResult::Unsat);
    }

    #[test]
    fn repeated_solve_is_idempotent() {
        let mut solver = Solver::new();
        solver.add_formula(&pigeon_hole_formula(3));

        assert_eq!(solver.solve(), SolverResult::Unsat);
        assert_eq!(solver.solve(), SolverResult::Unsat);
        assert_eq!(solver.stats().calls, 2);
    }

    #[test]
    fn same_seed_same_search() {
        let run = |seed: u32| {
            let mut solver = Solver::new();
            solver.set_seed(seed);
            solver.add_formula(&pigeon_hole_formula(4));
            let result = solver.solve();
            (result, solver.stats().conflicts, solver.stats().decisions)
        };

        assert_eq!(run(42), run(42));
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn pigeon_hole_with_core() {
        let mut solver = Solver::new();
        solver.enable_trace_generation();
        solver.add_formula(&pigeon_hole_formula(2));

        assert_eq!(solver.solve(), SolverResult::Unsat);

        let mut core = vec![];
        solver.write_core(&mut core).unwrap();

        // The core itself has to be unsatisfiable.
        let mut core_solver = Solver::new();
        core_solver.add_dimacs_cnf(&core[..]).unwrap();
        assert_eq!(core_solver.solve(), SolverResult::Unsat);
    }

    #[test]
    fn core_of_unit_chain_is_everything() {
        let mut solver = Solver::new();
        solver.enable_trace_generation();
        for clause in &[&[1, 2][..], &[-1, 3][..], &[-2, 3][..], &[-3][..]] {
            solver.add_clause(&clause.iter().map(|&l| Lit::from_dimacs(l)).collect::<Vec<_>>());
        }

        assert_eq!(solver.solve(), SolverResult::Unsat);

        let mut core = vec![];
        solver.write_core(&mut core).unwrap();

        let parsed = DimacsParser::parse(&core[..]).unwrap();
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn trace_is_well_formed() {
        let mut solver = Solver::new();
        solver.enable_trace_generation();
        solver.add_formula(&pigeon_hole_formula(2));

        assert_eq!(solver.solve(), SolverResult::Unsat);

        let mut trace = vec![];
        solver.write_trace(&mut trace).unwrap();
        let trace = String::from_utf8(trace).unwrap();

        let mut derived = 0;
        for line in trace.lines() {
            let mut fields = line.split_whitespace();
            let id: u32 = fields.next().unwrap().parse().unwrap();

            let rest: Vec<&str> = fields.collect();
            if rest.first() == Some(&"*") {
                derived += 1;
                // Antecedents are earlier clauses, listed in falling order.
                let mut prev = id;
                for &field in &rest[1..rest.len() - 1] {
                    let antecedent: u32 = field.parse().unwrap();
                    assert!(antecedent < prev);
                    prev = antecedent;
                }
                assert_eq!(rest.last(), Some(&"0"));
            } else {
                // Original clauses end in the "0 0" marker.
                assert_eq!(&rest[rest.len() - 2..], ["0", "0"]);
            }
        }

        assert!(derived > 0);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
            prop_assert_eq!(solve_formula(&formula), SolverResult::Unsat);
        }

        #[test]
        fn sat_with_consistent_model(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Sat);

            let model = solver.model().unwrap();
            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }

            for var in 1..=solver.num_variables() as i32 {
                let value = solver.value(var);
                prop_assert!(value == 1 || value == -1);
                prop_assert_eq!(value, -solver.value(-var));
            }
        }

        #[test]
        fn printed_formula_has_same_verdict(formula in sgen_unsat_formula(1..4usize)) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            let mut printed = vec![];
            solver.write_dimacs(&mut printed).unwrap();

            let mut reparsed = Solver::new();
            reparsed.add_dimacs_cnf(&printed[..]).unwrap();

            prop_assert_eq!(solver.solve(), SolverResult::Unsat);
            prop_assert_eq!(reparsed.solve(), SolverResult::Unsat);
        }

        #[test]
        fn incremental_clauses_flip_once(formula in sgen_unsat_formula(1..4usize)) {
            let mut solver = Solver::new();

            let mut last = SolverResult::Sat;

            for clause in formula.iter() {
                solver.add_clause(clause);
                let state = solver.solve();
                if state != last {
                    prop_assert_eq!(state, SolverResult::Unsat);
                    prop_assert_eq!(last, SolverResult::Sat);
                    last = state;
                }
            }

            prop_assert_eq!(last, SolverResult::Unsat);
        }

        #[test]
        fn assumption_core_disables_pigeons(
            (enable_row, _holes, formula) in conditional_pigeon_hole(1..4usize, 1..4usize)
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), SolverResult::Sat);

            for &lit in enable_row.iter() {
                solver.assume_lit(lit);
            }

            prop_assert_eq!(solver.solve(), SolverResult::Unsat);
            prop_assert!(solver.failed_assumption().is_some());

            prop_assert_eq!(solver.solve(), SolverResult::Sat);
        }
    }
}
