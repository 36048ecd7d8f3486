//! The implication graph.

use tracsat_formula::lit::LitIdx;
use tracsat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::proof::ClauseId;

/// Assignment source of a variable.
///
/// Binary reasons store only the partner literal, so no clause object is
/// needed for binary implications. Unit reasons store the trace id of the
/// (possibly derived) unit clause, which is zero when tracing is disabled.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// Decision or assumption.
    None,
    /// A unit clause.
    Unit(ClauseId),
    /// The other literal of a binary clause, false at assignment time.
    Binary([Lit; 1]),
    /// A long clause.
    Long(ClauseRef),
}

impl Reason {
    /// Whether this is a decision or assumption.
    pub fn is_none(&self) -> bool {
        matches!(self, Reason::None)
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Long(ClauseRef),
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
    /// Assigned by an assumption, or derived from assumptions at level 0.
    pub assumption: bool,
    /// Visitation flag of conflict analysis.
    pub mark: bool,
}

impl Default for ImplNode {
    fn default() -> ImplNode {
        ImplNode {
            reason: Reason::None,
            level: 0,
            assumption: false,
            mark: false,
        }
    }
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit clauses,
/// assumptions and decisions as sources. For each propagated assignment it
/// has incoming edges from the literals whose assignment caused the
/// propagation to happen.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(count, ImplNode::default());
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Whether the variable was assigned by or derived from an assumption.
    pub fn is_assumption(&self, var: Var) -> bool {
        self.nodes[var.index()].assumption
    }

    /// Analysis visitation flag.
    pub fn is_marked(&self, var: Var) -> bool {
        self.nodes[var.index()].mark
    }

    pub fn set_mark(&mut self, var: Var, mark: bool) {
        self.nodes[var.index()].mark = mark;
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in the
    /// trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason;
    }

    /// Whether a literal fixed at the top level outside of any assumption.
    ///
    /// Only meaningful for assigned literals.
    pub fn is_fixed(&self, var: Var) -> bool {
        let node = &self.nodes[var.index()];
        node.level == 0 && !node.assumption
    }

    /// Heap memory used by the graph.
    pub fn heap_bytes(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<ImplNode>()
    }
}
