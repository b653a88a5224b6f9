//! `oppsweep-reconcile`: closed/expired funding-opportunity reconciliation.
//!
//! Pure engine crate: reads through an [`OpportunityStore`] it is handed,
//! classifies, and deletes. No HTTP or CLI dependencies.

pub mod classify;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod store;

pub use engine::{run, RunOptions};
pub use error::ReconcileError;
pub use model::{
    CandidateSet, DeletionCandidate, DeletionReason, Opportunity, OpportunityId, RunOutcome,
};
pub use report::{AuditSink, Report};
pub use store::OpportunityStore;
