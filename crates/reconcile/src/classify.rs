use std::collections::HashSet;

use chrono::NaiveDate;
use log::warn;

use crate::model::{CandidateSet, DeletionCandidate, DeletionReason, Opportunity};

/// True when the deadline is present and strictly before `today`.
/// A deadline of `today` has not passed yet.
pub fn deadline_passed(opp: &Opportunity, today: NaiveDate) -> bool {
    match (opp.deadline.as_deref(), opp.deadline_date()) {
        (_, Some(deadline)) => deadline < today,
        (Some(raw), None) if !raw.trim().is_empty() => {
            warn!(
                "event=unparseable_deadline id={} value={:?}; treating as no deadline",
                opp.id, raw
            );
            false
        }
        _ => false,
    }
}

/// True only for an explicit `is_active = false`. Missing is not inactive.
pub fn is_marked_inactive(opp: &Opportunity) -> bool {
    opp.is_active == Some(false)
}

/// Select the opportunities to delete.
///
/// The deadline rule runs over the whole snapshot first; the inactive rule
/// then only picks up ids the deadline rule did not capture. Candidate
/// order follows that: expired rows in fetch order, then inactive rows in
/// fetch order. Pure, so classifying the same snapshot twice gives the
/// same set.
pub fn classify(opportunities: &[Opportunity], today: NaiveDate) -> CandidateSet {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for opp in opportunities {
        if deadline_passed(opp, today) && seen.insert(&opp.id) {
            candidates.push(DeletionCandidate {
                opportunity: opp.clone(),
                reason: DeletionReason::DeadlinePassed,
            });
        }
    }

    for opp in opportunities {
        if is_marked_inactive(opp) && seen.insert(&opp.id) {
            candidates.push(DeletionCandidate {
                opportunity: opp.clone(),
                reason: DeletionReason::MarkedInactive,
            });
        }
    }

    CandidateSet::new(candidates)
}
