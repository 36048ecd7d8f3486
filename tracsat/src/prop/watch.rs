//! Watchlists to detect clauses that became unit.
//!
//! Each long clause has two watches pointing to it, kept in the watchlists of
//! its first two literals. Whenever a watch is moved to a different literal
//! the literals of the clause are permuted so the watched literals stay in
//! positions 0 and 1.
//!
//! The watchlist of a literal is scanned when that literal is assigned false.
//! When no replacement watch can be found the clause is unit or conflicting.
//! There is no need to update watchlists on backtracking, as unassigning
//! variables cannot invalidate the watch invariant.
//!
//! As an optimization each watch stores a blocking literal of the clause that
//! is different from the watched literal. When the blocking literal is true
//! the clause is satisfied and the clause storage is not touched at all. See
//! [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for
//! details and references.
//!
//! Watchlists of literals that are fixed true at the top level outside of
//! assumptions are kept empty: such a literal can never be assigned false
//! again, so its watches are dead weight. The lists are dropped when the
//! literal is assigned and stale watches are not re-added when encountered.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf

use tracsat_formula::Lit;

use crate::clause::ClauseRef;

/// A watch on a long clause.
#[derive(Copy, Clone)]
pub struct Watch {
    /// Clause which has the watched literal in position 0 or 1.
    pub cref: ClauseRef,
    /// A literal of the clause, different from the watched literal.
    pub blocking: Lit,
}

/// Watchlists to detect clauses that became unit.
#[derive(Default)]
pub struct Watchlists {
    /// Watches of the clauses watched on each literal.
    watches: Vec<Vec<Watch>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Start watching a clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watch {
                cref,
                blocking: lits[i ^ 1],
            };
            self.watches[lits[i].code()].push(watch);
        }
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Whether a literal currently watches no clause.
    pub fn is_empty(&self, lit: Lit) -> bool {
        self.watches[lit.code()].is_empty()
    }

    /// Take the watch list of a literal for processing.
    ///
    /// Used by propagation so watches of other literals can be updated while
    /// the list is scanned. The caller puts the compacted list back with
    /// [`put_watched_on`](Watchlists::put_watched_on).
    pub fn take_watched_on(&mut self, lit: Lit) -> Vec<Watch> {
        std::mem::replace(&mut self.watches[lit.code()], vec![])
    }

    /// Return a watch list taken with [`take_watched_on`](Watchlists::take_watched_on).
    pub fn put_watched_on(&mut self, lit: Lit, watches: Vec<Watch>) {
        debug_assert!(self.watches[lit.code()].is_empty());
        self.watches[lit.code()] = watches;
    }

    /// Drop the watch list of a literal fixed true at the top level.
    pub fn clear(&mut self, lit: Lit) {
        self.watches[lit.code()] = vec![];
    }

    /// Drop all watches, in preparation of rebuilding them after a garbage
    /// collection.
    pub fn clear_all(&mut self) {
        for list in self.watches.iter_mut() {
            list.clear();
        }
    }

    /// Heap memory used by the watch lists.
    pub fn heap_bytes(&self) -> usize {
        let lists: usize = self
            .watches
            .iter()
            .map(|list| list.capacity() * std::mem::size_of::<Watch>())
            .sum();
        lists + self.watches.capacity() * std::mem::size_of::<Vec<Watch>>()
    }
}
