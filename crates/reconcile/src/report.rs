//! Human-readable audit of a reconciliation run.
//!
//! Output only, no decisions. Not a stable machine format; use the JSON
//! rendering of [`RunOutcome`](crate::model::RunOutcome) for that.
//!
//! A write that fails is reported as a [`FormatError`], logged, and skipped.
//! It never aborts the run.

use std::fmt;
use std::io::Write;

use chrono::NaiveDate;
use log::warn;

use crate::model::{CandidateSet, DeletionCandidate, DeletionReason};

const UNNAMED: &str = "(unnamed)";
const NO_DEADLINE: &str = "no deadline";

/// Receives the run's progress as it moves through its states.
pub trait AuditSink {
    fn classified(&mut self, reference_date: NaiveDate, fetched: usize, candidates: &CandidateSet);
    fn nothing_to_delete(&mut self);
    fn dry_run(&mut self, candidates: &CandidateSet);
    fn deleted(&mut self, deleted: usize);
    fn remaining(&mut self, remaining: u64);
}

/// Silent sink, for `--json` output and tests.
impl AuditSink for () {
    fn classified(&mut self, _: NaiveDate, _: usize, _: &CandidateSet) {}
    fn nothing_to_delete(&mut self) {}
    fn dry_run(&mut self, _: &CandidateSet) {}
    fn deleted(&mut self, _: usize) {}
    fn remaining(&mut self, _: u64) {}
}

/// Non-fatal audit output failure.
#[derive(Debug)]
pub struct FormatError {
    pub context: String,
    pub message: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot print {}: {}", self.context, self.message)
    }
}

impl std::error::Error for FormatError {}

/// Text report written to any `Write` (stdout in the CLI).
pub struct Report<W: Write> {
    out: W,
    skipped: usize,
}

impl<W: Write> Report<W> {
    pub fn new(out: W) -> Self {
        Self { out, skipped: 0 }
    }

    /// Number of lines that could not be written.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, context: &str, args: fmt::Arguments<'_>) {
        if let Err(e) = self.try_line(context, args) {
            self.skipped += 1;
            warn!("event=report_skip status=error {}", e);
        }
    }

    fn try_line(&mut self, context: &str, args: fmt::Arguments<'_>) -> Result<(), FormatError> {
        writeln!(self.out, "{}", args).map_err(|e| FormatError {
            context: context.to_string(),
            message: e.to_string(),
        })
    }

    fn candidate_line(&mut self, candidate: &DeletionCandidate) {
        let context = format!("candidate {}", candidate.opportunity.id);
        self.line(&context, format_args!("  - {}", describe_candidate(candidate)));
    }
}

impl<W: Write> AuditSink for Report<W> {
    fn classified(&mut self, reference_date: NaiveDate, fetched: usize, candidates: &CandidateSet) {
        self.line(
            "fetch summary",
            format_args!(
                "Fetched {} (reference date {})",
                plural(fetched, "opportunity", "opportunities"),
                reference_date,
            ),
        );

        if candidates.is_empty() {
            return;
        }

        self.line(
            "candidate summary",
            format_args!(
                "Found {} to delete:",
                plural(candidates.len(), "opportunity", "opportunities"),
            ),
        );
        for candidate in candidates.iter() {
            self.candidate_line(candidate);
        }

        let tally = candidates.tally();
        let expired = tally.get(&DeletionReason::DeadlinePassed).copied().unwrap_or(0);
        let inactive = tally.get(&DeletionReason::MarkedInactive).copied().unwrap_or(0);
        self.line(
            "reason tally",
            format_args!("  {} past deadline, {} marked inactive", expired, inactive),
        );
    }

    fn nothing_to_delete(&mut self) {
        self.line(
            "empty notice",
            format_args!("No closed or expired opportunities found; nothing to delete."),
        );
    }

    fn dry_run(&mut self, candidates: &CandidateSet) {
        self.line(
            "dry-run notice",
            format_args!(
                "Dry run: {} would be deleted; no changes made.",
                plural(candidates.len(), "opportunity", "opportunities"),
            ),
        );
    }

    fn deleted(&mut self, deleted: usize) {
        self.line(
            "deletion summary",
            format_args!("Deleted {}.", plural(deleted, "opportunity", "opportunities")),
        );
    }

    fn remaining(&mut self, remaining: u64) {
        self.line(
            "remaining count",
            format_args!("{} remaining.", plural(remaining, "opportunity", "opportunities")),
        );
    }
}

/// `name (deadline) [reason]`, with placeholders for missing fields.
pub fn describe_candidate(candidate: &DeletionCandidate) -> String {
    let opp = &candidate.opportunity;
    let name = opp
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNNAMED);
    let deadline = match (opp.deadline_date(), opp.deadline.as_deref()) {
        (Some(date), _) => format!("deadline {date}"),
        (None, Some(raw)) if !raw.trim().is_empty() => format!("deadline {raw:?}"),
        _ => NO_DEADLINE.to_string(),
    };
    format!("{} ({}) [{}]", name, deadline, candidate.reason)
}

fn plural<N>(n: N, one: &str, many: &str) -> String
where
    N: fmt::Display + PartialEq + From<u8>,
{
    if n == N::from(1) {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}
