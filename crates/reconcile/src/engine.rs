use chrono::NaiveDate;
use log::info;

use crate::classify::classify;
use crate::error::ReconcileError;
use crate::model::{CandidateSet, Opportunity, RunOutcome};
use crate::report::AuditSink;
use crate::store::OpportunityStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after classification; never call delete or count.
    pub dry_run: bool,
}

/// FETCHED: read the whole collection.
pub fn fetch<S: OpportunityStore + ?Sized>(store: &S) -> Result<Vec<Opportunity>, ReconcileError> {
    let opportunities = store.list_opportunities()?;
    info!("event=fetched status=ok rows={}", opportunities.len());
    Ok(opportunities)
}

/// DELETED: one bulk delete, then the remaining count.
///
/// The deletion reaches the sink before the count is requested, so a
/// failed count still leaves the delete on record. Returns `None` without
/// touching the store when `candidates` is empty.
pub fn delete_candidates<S, A>(
    store: &S,
    candidates: &CandidateSet,
    sink: &mut A,
) -> Result<Option<u64>, ReconcileError>
where
    S: OpportunityStore + ?Sized,
    A: AuditSink + ?Sized,
{
    if candidates.is_empty() {
        return Ok(None);
    }

    store.delete_opportunities(&candidates.ids())?;
    info!("event=deleted status=ok rows={}", candidates.len());
    sink.deleted(candidates.len());

    let remaining = store.count_opportunities()?;
    info!("event=counted status=ok remaining={}", remaining);
    sink.remaining(remaining);
    Ok(Some(remaining))
}

/// Run one reconciliation: FETCHED -> CLASSIFIED -> DELETED.
///
/// `today` is the single reference date for every deadline comparison in
/// the run. Any store error halts the run at the state it occurred in.
pub fn run<S, A>(
    store: &S,
    today: NaiveDate,
    options: RunOptions,
    sink: &mut A,
) -> Result<RunOutcome, ReconcileError>
where
    S: OpportunityStore + ?Sized,
    A: AuditSink + ?Sized,
{
    let opportunities = fetch(store)?;

    let candidates = classify(&opportunities, today);
    info!(
        "event=classified status=ok reference_date={} candidates={}",
        today,
        candidates.len()
    );
    sink.classified(today, opportunities.len(), &candidates);

    let mut outcome = RunOutcome {
        reference_date: today,
        fetched: opportunities.len(),
        candidates,
        deleted: 0,
        remaining: None,
        dry_run: options.dry_run,
    };

    if outcome.candidates.is_empty() {
        sink.nothing_to_delete();
        return Ok(outcome);
    }

    if options.dry_run {
        sink.dry_run(&outcome.candidates);
        return Ok(outcome);
    }

    if let Some(remaining) = delete_candidates(store, &outcome.candidates, sink)? {
        outcome.deleted = outcome.candidates.len();
        outcome.remaining = Some(remaining);
    }

    Ok(outcome)
}
