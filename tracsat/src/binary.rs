//! Binary clauses.
//!
//! Binary clauses are not allocated as clause objects. Each literal has a
//! dynamic list of partner literals; a clause `(a v b)` is stored as `b` in
//! `a`'s list and `a` in `b`'s list. The list of a literal is scanned when
//! that literal is assigned false, making every partner a unit implication.
use tracsat_formula::Lit;

/// Binary clauses as per-literal implication lists.
#[derive(Default)]
pub struct BinaryClauses {
    by_lit: Vec<Vec<Lit>>,
    count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.by_lit[lits[i].code()].push(lits[i ^ 1]);
        }
        self.count += 1;
    }

    /// Partner literals of the clauses containing `lit`.
    ///
    /// Each entry must be satisfied once `lit` is assigned false.
    pub fn implied_on(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Drop the implication list of a literal.
    ///
    /// Used when the literal is fixed true at the top level; its clauses are
    /// all permanently satisfied. The partner halves are purged lazily.
    pub fn clear(&mut self, lit: Lit) {
        self.by_lit[lit.code()] = vec![];
    }

    /// Remove list entries for which `satisfied` holds, i.e. stale halves of
    /// clauses whose other literal was fixed true.
    pub fn purge(&mut self, mut satisfied: impl FnMut(Lit) -> bool) {
        for list in self.by_lit.iter_mut() {
            list.retain(|&other| !satisfied(other));
        }
    }

    /// Number of added binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Iterate over the stored clauses as `(smaller, larger)` literal pairs.
    ///
    /// Clauses with a dropped list half are skipped; they are top level
    /// satisfied and subsumed by the corresponding unit.
    pub fn iter_clauses<'a>(&'a self) -> impl Iterator<Item = [Lit; 2]> + 'a {
        self.by_lit.iter().enumerate().flat_map(|(code, list)| {
            let lit = Lit::from_code(code);
            list.iter()
                .filter(move |&&other| lit.code() < other.code())
                .map(move |&other| [lit, other])
        })
    }

    /// Heap memory used by the implication lists.
    pub fn heap_bytes(&self) -> usize {
        let lists: usize = self
            .by_lit
            .iter()
            .map(|list| list.capacity() * std::mem::size_of::<Lit>())
            .sum();
        lists + self.by_lit.capacity() * std::mem::size_of::<Vec<Lit>>()
    }
}
