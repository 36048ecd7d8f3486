//! An incremental CDCL SAT solver with unsat core and proof trace extraction.
//!
//! The solver decides satisfiability of formulas in conjunctive normal form,
//! optionally under unit assumptions. For satisfiable formulas it produces a
//! total assignment; for unsatisfiable formulas with tracing enabled it can
//! emit a resolution trace and an unsatisfiable core.

mod analyze_conflict;
mod binary;
mod cdcl;
mod clause;
mod config;
mod context;
mod decision;
mod flt;
mod incremental;
mod load;
mod proof;
mod prop;
mod schedule;
mod simplify;
mod solver;
mod state;
mod tmp;
mod variables;

pub use config::SolverConfig;
pub use solver::{Solver, SolverResult, SolverStats};

pub use tracsat_formula::{CnfFormula, Lit, Var};
