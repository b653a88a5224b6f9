//! The three store operations a reconciliation run needs.

use crate::error::ReconcileError;
use crate::model::{Opportunity, OpportunityId};

pub const OP_LIST: &str = "list opportunities";
pub const OP_DELETE: &str = "delete opportunities";
pub const OP_COUNT: &str = "count opportunities";

/// Row-level access to the opportunity collection.
///
/// Implemented by the REST client in `oppsweep-store` and by in-memory
/// fakes in tests. Callers must not pass an empty id set to
/// [`delete_opportunities`](OpportunityStore::delete_opportunities).
pub trait OpportunityStore {
    /// All rows, projected to `id, name, deadline, is_active`.
    fn list_opportunities(&self) -> Result<Vec<Opportunity>, ReconcileError>;

    /// One bulk delete for the given ids.
    fn delete_opportunities(&self, ids: &[OpportunityId]) -> Result<(), ReconcileError>;

    /// Current row count.
    fn count_opportunities(&self) -> Result<u64, ReconcileError>;
}

impl<T: OpportunityStore + ?Sized> OpportunityStore for &T {
    fn list_opportunities(&self) -> Result<Vec<Opportunity>, ReconcileError> {
        (**self).list_opportunities()
    }

    fn delete_opportunities(&self, ids: &[OpportunityId]) -> Result<(), ReconcileError> {
        (**self).delete_opportunities(ids)
    }

    fn count_opportunities(&self) -> Result<u64, ReconcileError> {
        (**self).count_opportunities()
    }
}
