//! Replication of Clarisa institutions and their locations.
//!
//! - [`diff`] computes insert, update and remove sets between snapshots
//! - [`mapper`] turns Clarisa records into replica rows
//! - [`messages`] holds the lifecycle records every sync emits
//! - [`replicator`] drives a full cycle
//! - [`scheduler`] repeats cycles at a fixed cadence

pub mod diff;
pub mod mapper;
pub mod messages;
pub mod replicator;
pub mod scheduler;

pub use diff::{dedup_by_key, diff_by_key, insert_set, remove_candidates, update_candidates, KeyedDiff};
pub use mapper::{build_location_candidates, map_institution, LocationCandidates, UnresolvedOffice};
pub use messages::{EventLevel, SyncEntity, SyncEvent, SyncPhase};
pub use replicator::{CycleReport, PersistOutcome, Replicator, SyncReport, SyncStage};
pub use scheduler::spawn_schedule;
