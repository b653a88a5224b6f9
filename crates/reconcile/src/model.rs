use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Store-assigned row identifier. Tables keyed by `bigint` return numbers,
/// tables keyed by `uuid` return strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpportunityId {
    Int(i64),
    Text(String),
}

impl fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for OpportunityId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for OpportunityId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One funding-opportunity row, projected to the columns reconciliation reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw column value. `None` means the opportunity never expires by date.
    #[serde(default)]
    pub deadline: Option<String>,
    /// Only an explicit `Some(false)` retires a row.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Opportunity {
    /// Calendar date of the deadline in local time, if present and parseable.
    pub fn deadline_date(&self) -> Option<NaiveDate> {
        self.deadline.as_deref().and_then(parse_deadline)
    }
}

/// Parse a deadline column value into a local calendar date.
pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    parse_deadline_in(raw, &Local)
}

/// Parse a deadline column value into a calendar date in `tz`.
///
/// `timestamptz` values carry an offset (`2026-03-01T17:00:00+00:00`,
/// `2026-03-01 17:00:00+00`) and are converted to `tz` before the date is
/// taken. Plain dates and offset-less timestamps keep their literal date.
pub fn parse_deadline_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_offset = DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%#z"));
    if let Ok(dt) = with_offset {
        return Some(dt.with_timezone(tz).date_naive());
    }

    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    DeadlinePassed,
    MarkedInactive,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeadlinePassed => "deadline_passed",
            Self::MarkedInactive => "marked_inactive",
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionCandidate {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub reason: DeletionReason,
}

/// Opportunities selected for deletion in one run. Each id appears once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<DeletionCandidate>,
}

impl CandidateSet {
    pub(crate) fn new(candidates: Vec<DeletionCandidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeletionCandidate> {
        self.candidates.iter()
    }

    pub fn ids(&self) -> Vec<OpportunityId> {
        self.candidates.iter().map(|c| c.opportunity.id.clone()).collect()
    }

    pub fn reason_for(&self, id: &OpportunityId) -> Option<DeletionReason> {
        self.candidates
            .iter()
            .find(|c| &c.opportunity.id == id)
            .map(|c| c.reason)
    }

    /// Number of candidates per reason.
    pub fn tally(&self) -> HashMap<DeletionReason, usize> {
        let mut counts = HashMap::new();
        for c in &self.candidates {
            *counts.entry(c.reason).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub reference_date: NaiveDate,
    pub fetched: usize,
    pub candidates: CandidateSet,
    pub deleted: usize,
    /// Row count after the delete. `None` when nothing was deleted.
    pub remaining: Option<u64>,
    pub dry_run: bool,
}
