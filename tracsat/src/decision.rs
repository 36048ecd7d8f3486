//! Decision heuristics.

pub mod vsids;

pub use vsids::Vsids;

use partial_ref::{partial, PartialRef};

use tracsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::flt::Flt;
use crate::prop::assign_decision;

/// Jeroslow-Wang weights per literal.
///
/// Every original clause contributes `2^-size` to the weight of each of its
/// literals. The weights pick the polarity of a variable that has never been
/// assigned before; afterwards phase saving takes over.
#[derive(Default)]
pub struct JwWeights {
    by_lit: Vec<Flt>,
}

impl JwWeights {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, Flt::zero());
    }

    /// Add an original clause's contribution to all its literals.
    pub fn bump_clause(&mut self, lits: &[Lit]) {
        let inc = Flt::from_base2(1, -(lits.len() as i32));
        for &lit in lits {
            let weight = &mut self.by_lit[lit.code()];
            *weight = weight.add(inc);
        }
    }

    /// Weight of a literal.
    pub fn weight(&self, lit: Lit) -> Flt {
        self.by_lit[lit.code()]
    }

    /// Heap memory used by the weights.
    pub fn heap_bytes(&self) -> usize {
        self.by_lit.capacity() * std::mem::size_of::<Flt>()
    }
}

/// Pick the polarity for a decision variable.
///
/// Reuses the saved phase if the variable has been assigned before, otherwise
/// branches towards the larger Jeroslow-Wang weight.
fn decide_phase(
    ctx: partial!(Context, AssignmentP, JwWeightsP),
    var: Var,
) -> Lit {
    match ctx.part(AssignmentP).saved_phase(var) {
        Some(phase) => var.lit(phase),
        None => {
            let jw = ctx.part(JwWeightsP);
            if jw.weight(var.positive()) <= jw.weight(var.negative()) {
                var.negative()
            } else {
                var.positive()
            }
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    debug_assert!(a > 0 && b > 0);
    while b != 0 {
        let tmp = b;
        b = a % b;
        a = tmp;
    }
    a
}

/// Maybe pick a random unassigned variable as the next decision.
///
/// The spread grows linearly with the restart interval, so random decisions
/// become rarer as the intervals get longer. When the uniformly chosen
/// variable is already assigned, the scan continues with a random stride
/// coprime to the variable count, which visits every variable exactly once.
fn rdecide(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        AssignmentP,
        JwWeightsP,
        SolverConfigP,
        VariablesP,
    ),
) -> Option<Lit> {
    let config = ctx.part(SolverConfigP);
    let spread = (ctx.part(ScheduleP).drestart / 20)
        .max(config.min_random_spread)
        .min(config.max_random_spread);

    debug_assert!(spread > 1);
    if ctx.part_mut(ScheduleP).rrng(1, spread) != 2 {
        return None;
    }

    let var_count = ctx.part(VariablesP).count() as u64;
    debug_assert!(var_count >= 1);

    let mut index = ctx.part_mut(ScheduleP).rrng(1, var_count);
    let mut var = Var::from_index((index - 1) as usize);

    if !ctx.part(AssignmentP).lit_is_unk(var.positive()) {
        let mut delta = ctx.part_mut(ScheduleP).rrng(1, var_count);
        while gcd(delta, var_count) != 1 {
            delta -= 1;
        }

        loop {
            index += delta;
            if index > var_count {
                index -= var_count;
            }
            var = Var::from_index((index - 1) as usize);
            if ctx.part(AssignmentP).lit_is_unk(var.positive()) {
                break;
            }
        }
    }

    ctx.part_mut(ScheduleP).rdecisions += 1;
    Some(decide_phase(ctx.borrow(), var))
}

/// Pick the unassigned variable with the highest activity.
fn sdecide(
    mut ctx: partial!(Context, mut ScheduleP, mut VsidsP, AssignmentP, JwWeightsP),
) -> Lit {
    let var = loop {
        let var = ctx
            .part_mut(VsidsP)
            .next()
            .expect("decision requested but all variables are assigned");
        if ctx.part(AssignmentP).lit_is_unk(var.positive()) {
            break var;
        }
    };

    ctx.part_mut(ScheduleP).sdecisions += 1;
    decide_phase(ctx.borrow(), var)
}

/// Make the next decision and enqueue it.
pub fn decide(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut ScheduleP,
        mut TrailP,
        mut VsidsP,
        JwWeightsP,
        SolverConfigP,
        VariablesP,
    ),
) {
    let lit = match rdecide(ctx.borrow()) {
        Some(lit) => lit,
        None => sdecide(ctx.borrow()),
    };

    assign_decision(ctx.borrow(), lit);
    ctx.part_mut(ScheduleP).decisions += 1;
}
