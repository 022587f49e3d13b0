//! Local store accessor trait.

use crate::error::Result;
use crate::models::{Institution, InstitutionLocation, LocElement, NewInstitutionLocation};

/// Query and insert operations the replicator needs from the local store.
///
/// All operations are synchronous to match rusqlite's API. Each insert call
/// is one atomic unit: either the whole batch is stored or none of it.
pub trait ReplicaStore: Send + Sync {
    /// Institution with the greatest `updated_at`, if any row has one.
    fn last_updated_institution(&self) -> Result<Option<Institution>>;

    /// Institutions whose `id` is in `ids`.
    fn find_institutions_by_ids(&self, ids: &[i64]) -> Result<Vec<Institution>>;

    /// Insert a batch of institutions, returning the number of rows written.
    fn insert_institutions(&self, rows: &[Institution]) -> Result<usize>;

    /// The full `loc_elements` reference table.
    fn list_loc_elements(&self) -> Result<Vec<LocElement>>;

    /// Locations whose `institution_id` is in `ids`.
    fn find_locations_by_institution_ids(&self, ids: &[i64]) -> Result<Vec<InstitutionLocation>>;

    /// Insert a batch of locations, returning the number of rows written.
    fn insert_locations(&self, rows: &[NewInstitutionLocation]) -> Result<usize>;
}
