//! Clause activity.
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::flt::Flt;

use super::ClauseRef;

/// Clause activity.
///
/// The individual clause activities are stored in the clause headers. This
/// stores the global increment used for bumping and its rescale threshold.
pub struct ClauseActivity {
    /// The value to add on bumping.
    pub cinc: Flt,
    /// Rescale threshold for the increment.
    pub lcinc: Flt,
    /// Per-conflict growth factor of the increment.
    pub fcinc: Flt,
}

impl Default for ClauseActivity {
    fn default() -> ClauseActivity {
        ClauseActivity {
            cinc: Flt::from_base2(1, 0),
            lcinc: Flt::from_base2(1, 90),
            fcinc: Flt::from_ascii("1.001"),
        }
    }
}

/// Increase the activity of a learned long clause.
pub fn bump_clause_activity(
    mut ctx: partial!(Context, mut ClauseAllocP, ClauseActivityP),
    cref: ClauseRef,
) {
    let cinc = ctx.part(ClauseActivityP).cinc;
    let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
    if !header.learned() {
        return;
    }
    let bumped = header.activity().add(cinc);
    header.set_activity(bumped);
}

/// Grow the activity increment after a conflict, rescaling all learned clause
/// activities when the increment runs out of range.
pub fn decay_clause_activities(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseAllocP, ClauseDbP),
) {
    if ctx.part(ClauseActivityP).lcinc < ctx.part(ClauseActivityP).cinc {
        rescale_clause_activities(ctx.borrow());
    }

    let activity = ctx.part_mut(ClauseActivityP);
    activity.cinc = activity.cinc.mul(activity.fcinc);
}

/// Scale all learned clause activities and the increment down by the
/// increment's magnitude.
fn rescale_clause_activities(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseAllocP, ClauseDbP),
) {
    let shift = ctx.part(ClauseActivityP).cinc.log2();
    debug_assert!(shift > 0);
    let factor = Flt::from_base2(1, -shift);

    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    for &cref in db.clauses.iter() {
        let header = alloc.header_mut(cref);
        if header.deleted() || !header.learned() {
            continue;
        }
        let scaled = header.activity().mul(factor);
        header.set_activity(scaled);
    }

    let activity = ctx.part_mut(ClauseActivityP);
    activity.cinc = activity.cinc.mul(factor);
}
