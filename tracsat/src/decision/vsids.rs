//! The variable activity heap.
//!
//! Each variable has an activity score that is bumped whenever the variable
//! takes part in a conflict. Decisions branch on the unassigned variable with
//! the highest activity. Instead of decaying all scores after a conflict, the
//! bump increment grows by a constant factor; when the increment outgrows its
//! threshold, all scores and the increment are scaled down together.
//!
//! All scores are deterministic soft floats and ties are broken by the
//! variable index, so the branching order is reproducible bit for bit.

use tracsat_formula::Var;

use crate::flt::Flt;

/// The variable activity heap.
pub struct Vsids {
    /// The activity of each variable.
    score: Vec<Flt>,
    /// A binary max-heap of the variables.
    heap: Vec<Var>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// The value to add on bumping.
    vinc: Flt,
    /// Rescale threshold for the increment.
    lvinc: Flt,
    /// Per-conflict growth factor of the increment.
    fvinc: Flt,
}

impl Default for Vsids {
    fn default() -> Vsids {
        Vsids {
            score: vec![],
            heap: vec![],
            position: vec![],
            vinc: Flt::from_base2(1, 0),
            lvinc: Flt::from_base2(1, 90),
            fvinc: Flt::from_ascii("1.1"),
        }
    }
}

impl Vsids {
    /// Update structures for a new variable count.
    ///
    /// Every new variable enters the heap with the current increment as its
    /// initial score, and the increment grows by one per variable, so more
    /// recently imported variables are tried first.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.score.len();
        self.score.resize(count, Flt::zero());
        self.position.resize(count, None);

        for index in old_count..count {
            if self.lvinc < self.vinc {
                self.rescale();
            }
            self.vinc = self.vinc.add(Flt::from_base2(1, 0));

            self.score[index] = self.vinc;
            self.make_available(Var::from_index(index));
        }
    }

    /// Current activity score of a variable.
    pub fn score(&self, var: Var) -> Flt {
        self.score[var.index()]
    }

    /// Bump a variable by increasing its activity.
    pub fn bump(&mut self, var: Var) {
        self.score[var.index()] = self.score[var.index()].add(self.vinc);
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Grow the increment after a conflict, rescaling out-of-range scores.
    pub fn decay(&mut self) {
        if self.lvinc < self.vinc {
            self.rescale();
        }
        self.vinc = self.vinc.mul(self.fvinc);
    }

    /// Scale all scores and the increment down by the increment's magnitude.
    fn rescale(&mut self) {
        let shift = self.vinc.log2();
        debug_assert!(shift >= 0);
        let factor = Flt::from_base2(1, -shift);

        for score in self.score.iter_mut() {
            *score = score.mul(factor);
        }
        self.vinc = self.vinc.mul(factor);
    }

    /// Insert a variable into the heap if not already present.
    pub fn make_available(&mut self, var: Var) {
        if self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// Whether `a` ranks strictly above `b`.
    ///
    /// Ties in the score are broken towards the larger variable index.
    fn ranks_above(&self, a: Var, b: Var) -> bool {
        let score_a = self.score[a.index()];
        let score_b = self.score[b.index()];
        score_a > score_b || (score_a == score_b && a.index() > b.index())
    }

    /// Move a variable closer to the root until the heap property is satisfied.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            if pos == 0 {
                return;
            }
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if !self.ranks_above(var, parent_var) {
                return;
            }
            self.position[var.index()] = Some(parent_pos);
            self.heap[parent_pos] = var;
            self.position[parent_var.index()] = Some(pos);
            self.heap[pos] = parent_var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property is satisfied.
    fn sift_down(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            let mut largest_pos = pos;
            let mut largest_var = var;

            let left_pos = pos * 2 + 1;
            if left_pos < self.heap.len() {
                let left_var = self.heap[left_pos];
                if self.ranks_above(left_var, largest_var) {
                    largest_pos = left_pos;
                    largest_var = left_var;
                }
            }

            let right_pos = pos * 2 + 2;
            if right_pos < self.heap.len() {
                let right_var = self.heap[right_pos];
                if self.ranks_above(right_var, largest_var) {
                    largest_pos = right_pos;
                    largest_var = right_var;
                }
            }

            if largest_pos == pos {
                return;
            }

            self.position[var.index()] = Some(largest_pos);
            self.heap[largest_pos] = var;
            self.position[largest_var.index()] = Some(pos);
            self.heap[pos] = largest_var;
            pos = largest_pos;
        }
    }

    /// Heap memory used by the activity tables.
    pub fn heap_bytes(&self) -> usize {
        self.score.capacity() * std::mem::size_of::<Flt>()
            + self.heap.capacity() * std::mem::size_of::<Var>()
            + self.position.capacity() * std::mem::size_of::<Option<usize>>()
    }
}

impl Iterator for Vsids {
    type Item = Var;

    fn next(&mut self) -> Option<Var> {
        if self.heap.is_empty() {
            None
        } else {
            let var = self.heap.swap_remove(0);
            if !self.heap.is_empty() {
                let top_var = self.heap[0];
                self.position[top_var.index()] = Some(0);
                self.sift_down(0);
            }
            self.position[var.index()] = None;
            Some(var)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(count: usize) -> Vsids {
        let mut vsids = Vsids::default();
        vsids.set_var_count(count);
        // Drain the recency-biased initial scores for predictable tests.
        while vsids.next().is_some() {}
        for index in 0..count {
            vsids.score[index] = Flt::zero();
        }
        vsids
    }

    #[test]
    fn heap_sorts_by_bumps() {
        let mut vsids = fresh(8);

        for i in 0..8 {
            for _ in 0..i {
                vsids.bump(Var::from_index(i));
            }
        }

        for i in 0..8 {
            vsids.make_available(Var::from_index((i * 5) % 8));
        }

        for i in (0..8).rev() {
            assert_eq!(vsids.next(), Some(Var::from_index(i)));
        }
        assert_eq!(vsids.next(), None);
    }

    #[test]
    fn ties_break_towards_larger_index() {
        let mut vsids = fresh(4);

        for i in 0..4 {
            vsids.make_available(Var::from_index(i));
        }

        for i in (0..4).rev() {
            assert_eq!(vsids.next(), Some(Var::from_index(i)));
        }
    }

    #[test]
    fn new_variables_are_tried_first() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(3);
        vsids.set_var_count(5);

        assert_eq!(vsids.next(), Some(Var::from_index(4)));
        assert_eq!(vsids.next(), Some(Var::from_index(3)));
    }

    #[test]
    fn decay_keeps_relative_order() {
        let mut vsids = fresh(3);

        vsids.bump(Var::from_index(0));
        for _ in 0..200 {
            vsids.decay();
        }
        // The increment had to rescale along the way and bumping still
        // dominates the old score.
        vsids.bump(Var::from_index(2));

        assert!(vsids.score(Var::from_index(2)) > vsids.score(Var::from_index(0)));

        for i in 0..3 {
            vsids.make_available(Var::from_index(i));
        }
        assert_eq!(vsids.next(), Some(Var::from_index(2)));
    }
}
