//! Random formula generators for tests.
use proptest::{prelude::*, *};

use rand::distributions::Bernoulli;
use rand::seq::SliceRandom;

use crate::cnf::CnfFormula;
use crate::lit::{Lit, Var};

/// Generate small hard unsat instances.
///
/// Implementation of <http://www.cs.qub.ac.uk/~i.spence/sgen/> but with random
/// partitions
pub fn sgen_unsat_formula(
    blocks: impl Strategy<Value = usize>,
) -> impl Strategy<Value = CnfFormula> {
    blocks.prop_flat_map(|blocks| {
        collection::vec(bool::ANY, blocks * 4 + 1).prop_perturb(|negate, mut rng| {
            let mut clauses: Vec<Vec<Lit>> = vec![];
            let mut lits = negate
                .into_iter()
                .enumerate()
                .map(|(index, negate)| Lit::from_var(Var::from_index(index), negate))
                .collect::<Vec<_>>();

            for &invert in [false, true].iter() {
                lits.shuffle(&mut rng);
                for block in lits.chunks_exact(4) {
                    for a in 0..4 {
                        for b in 0..a {
                            for c in 0..b {
                                let mut clause =
                                    vec![block[a] ^ invert, block[b] ^ invert, block[c] ^ invert];
                                clause.shuffle(&mut rng);
                                clauses.push(clause);
                            }
                        }
                    }
                }
                let &lit_a = lits.last().unwrap();
                for b in 0..4 {
                    for c in 0..b {
                        let mut clause = vec![lit_a ^ invert, lits[b] ^ invert, lits[c] ^ invert];
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }
                }
            }

            clauses.shuffle(&mut rng);
            CnfFormula::from(clauses)
        })
    })
}

/// Generate a sat instance.
///
/// This generates a random full assignment and then only generates clauses
/// compatible with that assignment.
pub fn sat_formula(
    vars: impl Strategy<Value = usize>,
    clause_count: impl Strategy<Value = usize>,
    density: impl Strategy<Value = f64>,
    polarity_dist: impl Strategy<Value = f64>,
) -> impl Strategy<Value = CnfFormula> {
    (vars, clause_count, density, polarity_dist).prop_flat_map(
        |(vars, clause_count, density, polarity_dist)| {
            let density = Bernoulli::new(density).unwrap();
            let polarity_dist = Bernoulli::new(polarity_dist).unwrap();

            collection::vec(bool::ANY, vars).prop_perturb(move |negate, mut rng| {
                let mut clauses: Vec<Vec<Lit>> = vec![];
                let lits = negate
                    .into_iter()
                    .enumerate()
                    .map(|(index, negate)| Lit::from_var(Var::from_index(index), negate))
                    .collect::<Vec<_>>();

                for _ in 0..clause_count {
                    let &fixed_lit = lits.choose(&mut rng).unwrap();
                    let mut clause = vec![fixed_lit];
                    for &lit in lits.iter() {
                        if lit != fixed_lit && rng.sample(density) {
                            clause.push(lit ^ rng.sample(polarity_dist));
                        }
                    }
                    clause.shuffle(&mut rng);
                    clauses.push(clause);
                }

                clauses.shuffle(&mut rng);
                CnfFormula::from(clauses)
            })
        },
    )
}

/// A pigeon hole formula with `holes + 1` pigeons.
///
/// Unsatisfiable by the pigeon hole principle.
pub fn pigeon_hole_formula(holes: usize) -> CnfFormula {
    let pigeons = holes + 1;
    let var = |pigeon: usize, hole: usize| Var::from_index(pigeon * holes + hole);

    let mut formula = CnfFormula::new();

    for pigeon in 0..pigeons {
        let clause: Vec<Lit> = (0..holes).map(|hole| var(pigeon, hole).positive()).collect();
        formula.add_clause(clause);
    }

    for hole in 0..holes {
        for pigeon_a in 0..pigeons {
            for pigeon_b in 0..pigeon_a {
                formula.add_clause(
                    [var(pigeon_a, hole).negative(), var(pigeon_b, hole).negative()].iter(),
                );
            }
        }
    }

    formula
}

/// A pigeon hole formula where each row is only active when its enable
/// variable is set.
///
/// Returns the enable literals and the formula. Assuming all enable literals
/// makes the formula unsatisfiable, as does adding them as unit clauses.
pub fn conditional_pigeon_hole(
    holes: impl Strategy<Value = usize>,
    extra_pigeons: impl Strategy<Value = usize>,
) -> impl Strategy<Value = (Vec<Lit>, usize, CnfFormula)> {
    (holes, extra_pigeons).prop_map(|(holes, extra_pigeons)| {
        let pigeons = holes + extra_pigeons;
        let enable = |pigeon: usize| Var::from_index(pigeon).positive();
        let var = |pigeon: usize, hole: usize| Var::from_index(pigeons + pigeon * holes + hole);

        let mut formula = CnfFormula::new();

        for pigeon in 0..pigeons {
            let mut clause: Vec<Lit> = vec![!enable(pigeon)];
            clause.extend((0..holes).map(|hole| var(pigeon, hole).positive()));
            formula.add_clause(clause);
        }

        for hole in 0..holes {
            for pigeon_a in 0..pigeons {
                for pigeon_b in 0..pigeon_a {
                    formula.add_clause(
                        [var(pigeon_a, hole).negative(), var(pigeon_b, hole).negative()].iter(),
                    );
                }
            }
        }

        let enable_row: Vec<Lit> = (0..holes + 1).map(enable).collect();

        (enable_row, holes, formula)
    })
}
