//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use tracsat_formula::Lit;

use super::header::HEADER_LEN;
use super::{ClauseHeader, ClauseRef};

use crate::context::{parts::*, Context};
use crate::prop::Reason;

/// Database for long clauses.
///
/// Removal of clauses from the `clauses` field can be delayed; the header's
/// deleted flag needs to be checked when iterating over it. This also tracks
/// the clause statistics used by the reduce and simplify policies.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above
    pub clauses: Vec<ClauseRef>,
    /// Size of deleted but not collected clauses
    pub garbage_size: usize,

    /// Original unit clauses, kept for printing the formula; units have no
    /// clause objects, only their level 0 assignments.
    pub units: Vec<Lit>,
    /// Whether an empty clause was added or derived.
    pub empty_added: bool,

    /// Added original clauses of any size.
    pub oadded: u64,
    /// Added learned clauses of any size.
    pub ladded: u64,
    /// Live long original clauses and their literals.
    pub oclauses: usize,
    pub olits: usize,
    /// Live long learned clauses and their literals.
    pub lclauses: usize,
    pub llits: usize,
    /// Long original/learned clauses that have been an antecedent.
    pub oused: usize,
    pub lused: usize,
    /// Long learned clauses currently locked as reasons.
    pub llocked: usize,
    /// Long learned clauses pinned across the next reduction.
    pub lfixed: usize,
}

impl ClauseDb {
    /// Clauses added in total, original and learned.
    pub fn added_clauses(&self) -> u64 {
        self.oadded + self.ladded
    }
}

/// Add a long clause to the database.
pub fn add_long_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let learned = header.learned();
    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    let db = ctx.part_mut(ClauseDbP);
    db.clauses.push(cref);
    if learned {
        db.lclauses += 1;
        db.llits += lits.len();
    } else {
        db.oclauses += 1;
        db.olits += lits.len();
    }

    cref
}

/// Mark a long clause as deleted.
///
/// The storage is reclaimed by the next garbage collection.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

    header.set_deleted(true);

    if header.learned() {
        db.lclauses -= 1;
        db.llits -= header.len();
    } else {
        db.oclauses -= 1;
        db.olits -= header.len();
    }
    if header.fixed() {
        db.lfixed -= 1;
    }

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Record that a long clause was an antecedent.
pub fn mark_used(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let header = alloc.header_mut(cref);
    if header.used() {
        return;
    }
    header.set_used(true);

    let db = ctx.part_mut(ClauseDbP);
    if header.learned() {
        db.lused += 1;
    } else {
        db.oused += 1;
    }
}

/// Lock a reason clause while its propagated literal is assigned.
pub fn lock_reason(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), reason: &Reason) {
    if let Reason::Long(cref) = *reason {
        let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
        let header = alloc.header_mut(cref);
        debug_assert!(!header.locked());
        header.set_locked(true);
        if header.learned() {
            ctx.part_mut(ClauseDbP).llocked += 1;
        }
    }
}

/// Release the lock of a reason clause on unassignment.
pub fn unlock_reason(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), reason: &Reason) {
    if let Reason::Long(cref) = *reason {
        let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
        let header = alloc.header_mut(cref);
        debug_assert!(header.locked());
        header.set_locked(false);
        if header.learned() {
            let db = ctx.part_mut(ClauseDbP);
            debug_assert!(db.llocked > 0);
            db.llocked -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tracsat_formula::{cnf_formula, lits};

    #[test]
    fn counters_follow_add_and_delete() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4, 5;
        ];

        let mut crefs = vec![];

        for (index, clause) in clauses.iter().enumerate() {
            let mut header = ClauseHeader::new();
            header.set_learned(index == 2);
            crefs.push(add_long_clause(ctx.borrow(), header, clause));
        }

        assert_eq!(ctx.part(ClauseDbP).oclauses, 2);
        assert_eq!(ctx.part(ClauseDbP).olits, 6);
        assert_eq!(ctx.part(ClauseDbP).lclauses, 1);
        assert_eq!(ctx.part(ClauseDbP).llits, 4);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).oclauses, 1);
        assert_eq!(ctx.part(ClauseDbP).olits, 3);
        assert_eq!(ctx.part(ClauseDbP).lclauses, 0);
        assert_eq!(ctx.part(ClauseDbP).llits, 0);
        assert!(ctx.part(ClauseDbP).garbage_size > 0);
    }

    #[test]
    fn used_marking_is_idempotent() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        let mut header = ClauseHeader::new();
        header.set_learned(true);
        let cref = add_long_clause(ctx.borrow(), header, &lits![1, 2, 3]);

        mark_used(ctx.borrow(), cref);
        mark_used(ctx.borrow(), cref);

        assert_eq!(ctx.part(ClauseDbP).lused, 1);
        assert_eq!(ctx.part(ClauseDbP).oused, 0);
    }
}
