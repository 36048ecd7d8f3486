//! Proof tracing and unsatisfiable core extraction.
//!
//! When tracing is enabled before the first clause is added, every clause the
//! solver ever creates gets a monotonically increasing id. Original clauses
//! record their literals; learned clauses record a compressed antecedent
//! chain: the antecedent ids sorted in descending order, stored as the LEB128
//! encoded differences between consecutive ids, terminated by a zero byte.
//! Differences are always at least one, so the terminator is unambiguous.
//!
//! The unsatisfiable core is found by walking the chains backwards from the
//! empty clause (or from the reason of a failed assumption), marking every
//! clause reached. The trace output lists all marked clauses in id order;
//! the core output is a DIMACS file of the marked original clauses.
use std::io::Write;

use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use tracsat_formula::Lit;

use crate::context::{parts::*, Context};
use crate::prop::Reason;
use crate::state::SatState;

/// Identifies a traced clause; zero means tracing was disabled.
pub type ClauseId = u32;

enum TraceEntry {
    Original { lits: Vec<Lit>, core: bool },
    Learned { chain: Vec<u8>, core: bool },
}

/// Proof tracing state.
#[derive(Default)]
pub struct Proof {
    enabled: bool,
    /// Trace entries indexed by clause id; id zero is reserved.
    entries: Vec<TraceEntry>,
    /// Trace ids of binary clauses, keyed by their sorted literal pair.
    binary_ids: FxHashMap<[Lit; 2], ClauseId>,
    /// Id of the first derived empty clause.
    empty_clause: Option<ClauseId>,
    /// Cached number of original core clauses after a core walk.
    core_originals: Option<usize>,
}

impl Proof {
    /// Enable trace generation.
    ///
    /// Must happen before any clause is added so that all antecedents carry
    /// ids.
    pub fn enable(&mut self) {
        self.enabled = true;
        if self.entries.is_empty() {
            self.entries.push(TraceEntry::Original {
                lits: vec![],
                core: false,
            });
        }
    }

    /// Whether trace generation is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an original clause, returning its id.
    pub fn add_original(&mut self, lits: &[Lit]) -> ClauseId {
        debug_assert!(self.enabled);
        let id = self.entries.len() as ClauseId;
        self.entries.push(TraceEntry::Original {
            lits: lits.to_vec(),
            core: false,
        });
        id
    }

    /// Record a learned clause with the given antecedent ids, returning the
    /// new clause's id.
    pub fn add_learned(&mut self, mut antecedents: Vec<ClauseId>) -> ClauseId {
        debug_assert!(self.enabled);
        debug_assert!(!antecedents.is_empty());
        debug_assert!(antecedents.iter().all(|&id| id != 0));

        let id = self.entries.len() as ClauseId;

        antecedents.sort_unstable_by(|a, b| b.cmp(a));
        antecedents.dedup();

        let mut chain = vec![];
        let mut prev = id;
        for &antecedent in antecedents.iter() {
            debug_assert!(antecedent < prev);
            let delta = (prev - antecedent) as u64;
            leb128::write::unsigned(&mut chain, delta).expect("writing to a vec cannot fail");
            prev = antecedent;
        }
        chain.push(0);

        self.entries.push(TraceEntry::Learned { chain, core: false });
        id
    }

    /// Remember the trace id of a binary clause.
    pub fn register_binary(&mut self, mut lits: [Lit; 2], id: ClauseId) {
        debug_assert!(self.enabled);
        lits.sort_unstable();
        self.binary_ids.entry(lits).or_insert(id);
    }

    /// Trace id of a binary clause.
    pub fn binary_id(&self, mut lits: [Lit; 2]) -> ClauseId {
        lits.sort_unstable();
        self.binary_ids[&lits]
    }

    /// Record the first derived empty clause.
    pub fn set_empty_clause(&mut self, id: ClauseId) {
        if self.empty_clause.is_none() {
            self.empty_clause = Some(id);
        }
    }

    /// Id of the derived empty clause, if any.
    pub fn empty_clause(&self) -> Option<ClauseId> {
        self.empty_clause
    }

    /// Walk the antecedent chains from the given root, marking all clauses
    /// reached. Returns the number of original clauses in the core.
    fn mark_core(&mut self, root: ClauseId) -> usize {
        if let Some(count) = self.core_originals {
            return count;
        }

        let mut original_count = 0;
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            match &mut self.entries[id as usize] {
                TraceEntry::Original { core, .. } => {
                    if !*core {
                        *core = true;
                        original_count += 1;
                    }
                }
                TraceEntry::Learned { chain, core } => {
                    if *core {
                        continue;
                    }
                    *core = true;

                    let mut prev = id;
                    let mut bytes = &chain[..];
                    while bytes[0] != 0 {
                        let delta = leb128::read::unsigned(&mut bytes)
                            .expect("malformed antecedent chain");
                        let antecedent = prev - delta as ClauseId;
                        stack.push(antecedent);
                        prev = antecedent;
                    }
                }
            }
        }

        self.core_originals = Some(original_count);
        original_count
    }

    /// Heap memory used by the trace.
    pub fn heap_bytes(&self) -> usize {
        let entries: usize = self
            .entries
            .iter()
            .map(|entry| match entry {
                TraceEntry::Original { lits, .. } => lits.capacity() * std::mem::size_of::<Lit>(),
                TraceEntry::Learned { chain, .. } => chain.capacity(),
            })
            .sum();
        entries
            + self.entries.capacity() * std::mem::size_of::<TraceEntry>()
            + self.binary_ids.len() * (std::mem::size_of::<[Lit; 2]>() + std::mem::size_of::<ClauseId>())
    }
}

/// The id of the clause the core walk starts from.
///
/// This is the empty clause when one was derived. For a failed assumption it
/// is the reason of the assumption's complement; a failed assumption without
/// a reason means two assumptions contradict each other directly and there is
/// no clause to blame.
fn trace_root(
    ctx: partial!(Context, ClauseAllocP, ImplGraphP, IncrementalP, ProofP),
) -> Option<ClauseId> {
    if let Some(id) = ctx.part(ProofP).empty_clause() {
        return Some(id);
    }

    let failed = ctx.part(IncrementalP).failed_assumption()?;
    match *ctx.part(ImplGraphP).reason(failed.var()) {
        Reason::None => None,
        Reason::Unit(id) => Some(id),
        Reason::Binary(lits) => {
            let other = lits[0];
            Some(ctx.part(ProofP).binary_id([!failed, other]))
        }
        Reason::Long(cref) => Some(ctx.part(ClauseAllocP).header(cref).trace_id()),
    }
}

fn check_trace_available(ctx: partial!(Context, ProofP, SolverStateP)) {
    assert!(
        ctx.part(ProofP).is_enabled(),
        "trace generation was not enabled"
    );
    assert!(
        ctx.part(SolverStateP).solution_valid,
        "trace requested without a preceding solve"
    );
    assert!(
        matches!(
            ctx.part(SolverStateP).sat_state,
            SatState::Unsat | SatState::UnsatUnderAssumptions
        ),
        "trace requested but the last solve did not return unsat"
    );
}

/// Write the resolution trace of the last unsatisfiability result.
///
/// Original core clauses are written as `id <lits> 0 0`, learned core clauses
/// as `id * <antecedent ids> 0` with the antecedents in descending id order.
pub fn write_trace(
    mut ctx: partial!(
        Context,
        mut ProofP,
        ClauseAllocP,
        ImplGraphP,
        IncrementalP,
        SolverStateP,
    ),
    target: &mut impl Write,
) -> anyhow::Result<()> {
    check_trace_available(ctx.borrow());

    let root = match trace_root(ctx.borrow()) {
        Some(root) => root,
        None => return Ok(()),
    };

    let proof = ctx.part_mut(ProofP);
    proof.mark_core(root);

    for (id, entry) in proof.entries.iter().enumerate() {
        match entry {
            TraceEntry::Original { lits, core } if *core => {
                itoa::write(&mut *target, id)?;
                target.write_all(b" ")?;
                for &lit in lits.iter() {
                    itoa::write(&mut *target, lit.to_dimacs())?;
                    target.write_all(b" ")?;
                }
                target.write_all(b"0 0\n")?;
            }
            TraceEntry::Learned { chain, core } if *core => {
                itoa::write(&mut *target, id)?;
                target.write_all(b" * ")?;

                let mut prev = id as ClauseId;
                let mut bytes = &chain[..];
                while bytes[0] != 0 {
                    let delta = leb128::read::unsigned(&mut bytes)?;
                    let antecedent = prev - delta as ClauseId;
                    itoa::write(&mut *target, antecedent)?;
                    target.write_all(b" ")?;
                    prev = antecedent;
                }
                target.write_all(b"0\n")?;
            }
            _ => (),
        }
    }

    Ok(())
}

/// Write the unsatisfiable core as a DIMACS CNF formula.
///
/// The core consists of the original clauses reachable from the empty clause
/// (or the failed assumption's reason) through the antecedent chains.
pub fn write_core(
    mut ctx: partial!(
        Context,
        mut ProofP,
        ClauseAllocP,
        ImplGraphP,
        IncrementalP,
        SolverStateP,
        VariablesP,
    ),
    target: &mut impl Write,
) -> anyhow::Result<()> {
    check_trace_available(ctx.borrow());

    let core_count = match trace_root(ctx.borrow()) {
        Some(root) => ctx.part_mut(ProofP).mark_core(root),
        None => 0,
    };

    writeln!(
        target,
        "p cnf {} {}",
        ctx.part(VariablesP).count(),
        core_count
    )?;

    for entry in ctx.part(ProofP).entries.iter() {
        if let TraceEntry::Original { lits, core: true } = entry {
            for &lit in lits.iter() {
                itoa::write(&mut *target, lit.to_dimacs())?;
                target.write_all(b" ")?;
            }
            target.write_all(b"0\n")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracsat_formula::{lit, lits};

    #[test]
    fn chain_roundtrip() {
        let mut proof = Proof::default();
        proof.enable();

        let a = proof.add_original(&lits![1, 2]);
        let b = proof.add_original(&lits![-1, 2]);
        let c = proof.add_original(&lits![-2]);

        let learned = proof.add_learned(vec![a, b, c]);
        assert_eq!(learned, 4);

        let count = proof.mark_core(learned);
        assert_eq!(count, 3);

        // Marking again is cached and idempotent.
        assert_eq!(proof.mark_core(learned), 3);
    }

    #[test]
    fn binary_ids_are_order_independent() {
        let mut proof = Proof::default();
        proof.enable();

        let id = proof.add_original(&lits![1, 2]);
        proof.register_binary([lit!(1), lit!(2)], id);

        assert_eq!(proof.binary_id([lit!(2), lit!(1)]), id);
    }

    #[test]
    fn duplicate_binary_keeps_first_id() {
        let mut proof = Proof::default();
        proof.enable();

        let first = proof.add_original(&lits![1, 2]);
        proof.register_binary([lit!(1), lit!(2)], first);
        let second = proof.add_original(&lits![2, 1]);
        proof.register_binary([lit!(2), lit!(1)], second);
        let _ = second;

        assert_eq!(proof.binary_id([lit!(1), lit!(2)]), first);
    }
}
