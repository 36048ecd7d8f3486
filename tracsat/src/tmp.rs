//! Temporary data.
use tracsat_formula::Lit;

use crate::clause::ClauseRef;
use crate::proof::ClauseId;
use crate::prop::{Conflict, Reason};

/// An antecedent clause used in a resolution step.
///
/// Collected while analyzing a conflict or while resolving a clause against
/// top level assignments, and consumed when the resulting clause is added:
/// antecedents are marked as used and, with tracing enabled, their ids become
/// the new clause's compressed chain.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Antecedent {
    Long(ClauseRef),
    Binary([Lit; 2]),
    Unit(ClauseId),
}

impl Antecedent {
    /// The reason of an assigned literal as an antecedent.
    ///
    /// `lit` must be the literal that was assigned true by the reason; it
    /// completes binary reasons to a full clause.
    pub fn of_reason(lit: Lit, reason: &Reason) -> Antecedent {
        match *reason {
            Reason::Unit(id) => Antecedent::Unit(id),
            Reason::Binary([other]) => Antecedent::Binary([lit, other]),
            Reason::Long(cref) => Antecedent::Long(cref),
            Reason::None => unreachable!("decisions have no antecedent"),
        }
    }
}

impl From<Conflict> for Antecedent {
    fn from(conflict: Conflict) -> Antecedent {
        match conflict {
            Conflict::Binary(lits) => Antecedent::Binary(lits),
            Conflict::Long(cref) => Antecedent::Long(cref),
        }
    }
}

/// Temporary data used by various parts of the solver.
///
/// `lits` doubles as the staging buffer for clauses under construction: the
/// incremental `add` API appends literals here, and conflict analysis emits
/// the learned clause here before it is added.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    pub resolved: Vec<Antecedent>,
}
