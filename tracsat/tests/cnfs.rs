//! End to end scenarios on small concrete formulas.
use tracsat::{Solver, SolverResult};

fn add_clauses(solver: &mut Solver, clauses: &[&[i32]]) {
    for clause in clauses {
        for &lit in clause.iter() {
            solver.add(lit);
        }
        solver.add(0);
    }
}

#[test]
fn all_four_polarities_unsat() {
    let mut solver = Solver::new();
    add_clauses(&mut solver, &[&[1, 2], &[-1, 2], &[1, -2], &[-1, -2]]);
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn implication_chain_to_false_unsat_with_full_core() {
    let mut solver = Solver::new();
    solver.enable_trace_generation();
    add_clauses(&mut solver, &[&[1, 2], &[-1, 3], &[-2, 3], &[-3]]);
    assert_eq!(solver.solve(), SolverResult::Unsat);

    let mut core = vec![];
    solver.write_core(&mut core).unwrap();
    let core = String::from_utf8(core).unwrap();

    let clause_lines = core.lines().filter(|line| !line.starts_with('p')).count();
    assert_eq!(clause_lines, 4);

    assert!(core.lines().next().unwrap().starts_with("p cnf 3 4"));
}

#[test]
fn exactly_one_of_three_sat() {
    let mut solver = Solver::new();
    add_clauses(&mut solver, &[&[1, 2, 3], &[-1, -2], &[-2, -3], &[-1, -3]]);
    assert_eq!(solver.solve(), SolverResult::Sat);

    let true_count = (1..=3).filter(|&v| solver.value(v) == 1).count();
    assert_eq!(true_count, 1);

    for clause in &[&[1, 2, 3][..], &[-1, -2][..], &[-2, -3][..], &[-1, -3][..]] {
        assert!(clause.iter().any(|&lit| solver.value(lit) == 1));
    }
}

#[test]
fn unit_implication_chain_sat() {
    let mut solver = Solver::new();
    add_clauses(&mut solver, &[&[1], &[-1, 2], &[-2, 3]]);
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert_eq!(solver.value(1), 1);
    assert_eq!(solver.value(2), 1);
    assert_eq!(solver.value(3), 1);
}

#[test]
fn assumptions_against_binary_clause() {
    let mut solver = Solver::new();
    add_clauses(&mut solver, &[&[1, 2]]);
    solver.assume(-1);
    solver.assume(-2);

    assert_eq!(solver.solve(), SolverResult::Unsat);
    let failed = solver.failed_assumption().unwrap().to_dimacs();
    assert!(failed == -1 || failed == -2);
}

#[test]
fn pigeon_hole_three_pigeons_two_holes() {
    // Variables p_{i,j} = pigeon i sits in hole j, numbered 1..=6.
    let mut solver = Solver::new();
    add_clauses(
        &mut solver,
        &[
            &[1, 2],
            &[3, 4],
            &[5, 6],
            &[-1, -3],
            &[-1, -5],
            &[-3, -5],
            &[-2, -4],
            &[-2, -6],
            &[-4, -6],
        ],
    );
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn print_and_reparse_keeps_verdict() {
    let mut sat_solver = Solver::new();
    add_clauses(&mut sat_solver, &[&[1, 2, 3], &[-1, -2], &[-2, -3]]);

    let mut unsat_solver = Solver::new();
    add_clauses(&mut unsat_solver, &[&[1], &[-1, 2], &[-2]]);

    for (solver, expected) in [
        (&mut sat_solver, SolverResult::Sat),
        (&mut unsat_solver, SolverResult::Unsat),
    ]
    .iter_mut()
    {
        let mut printed = vec![];
        solver.write_dimacs(&mut printed).unwrap();

        let mut reparsed = Solver::new();
        reparsed.add_dimacs_cnf(&printed[..]).unwrap();

        assert_eq!(solver.solve(), *expected);
        assert_eq!(reparsed.solve(), *expected);
    }
}

#[test]
fn incremental_add_after_solve() {
    let mut solver = Solver::new();
    add_clauses(&mut solver, &[&[1, 2]]);
    assert_eq!(solver.solve(), SolverResult::Sat);

    add_clauses(&mut solver, &[&[-1]]);
    assert_eq!(solver.solve(), SolverResult::Sat);
    assert_eq!(solver.value(2), 1);

    add_clauses(&mut solver, &[&[-2]]);
    assert_eq!(solver.solve(), SolverResult::Unsat);

    // Once unsatisfiable, further solves stay unsatisfiable.
    assert_eq!(solver.solve(), SolverResult::Unsat);
}

#[test]
fn trace_of_direct_contradiction() {
    let mut solver = Solver::new();
    solver.enable_trace_generation();
    add_clauses(&mut solver, &[&[7], &[-7]]);
    assert_eq!(solver.solve(), SolverResult::Unsat);

    let mut trace = vec![];
    solver.write_trace(&mut trace).unwrap();
    let trace = String::from_utf8(trace).unwrap();

    // Both units and a derived empty clause have to show up.
    assert!(trace.lines().count() >= 3);
    assert!(trace.lines().any(|line| line.contains('*')));
}
