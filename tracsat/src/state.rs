//! Miscellaneous solver state.
use std::time::Instant;

use crate::prop::Conflict;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be
/// moved into a separate part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
    /// Conflict found but not yet turned into a learned clause.
    pub conflict: Option<Conflict>,
    /// Whether the assignment and failed assumption of the last solve are
    /// still valid, i.e. no clause or assumption was added since.
    pub solution_valid: bool,
    /// High water mark of the byte accounting.
    pub max_bytes: usize,
    /// Accumulated time spent inside solver entry points.
    pub seconds: f64,
    pub entered: Option<Instant>,
}

impl SolverState {
    /// Record the entry into a timed solver entry point.
    pub fn enter(&mut self) {
        self.entered = Some(Instant::now());
    }

    /// Record leaving a timed solver entry point.
    pub fn leave(&mut self) {
        if let Some(entered) = self.entered.take() {
            self.seconds += entered.elapsed().as_secs_f64();
        }
    }
}
