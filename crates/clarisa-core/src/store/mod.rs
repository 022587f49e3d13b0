//! Local relational store holding the replicated tables.
//!
//! Three tables are involved:
//! - `institutions`, keyed by the Clarisa code
//! - `institution_locations`, naturally keyed by `(institution_id, loc_element_id)`
//! - `loc_elements`, a read-only geographic reference table

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::ReplicaStore;
