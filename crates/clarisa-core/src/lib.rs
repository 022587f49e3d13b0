//! Clarisa Core - Replication of the Clarisa institutions catalogue.
//!
//! Pulls institutions from the Clarisa reference API, compares them with a
//! local relational replica and inserts whatever is new, along with the
//! country offices of every institution resolved to local location elements.
//!
//! # Example
//!
//! ```rust,ignore
//! use clarisa_core::{ClarisaCredentials, ReplicationConfig, Replicator, SqliteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> clarisa_core::Result<()> {
//!     let config = ReplicationConfig {
//!         host: "https://api.clarisa.cgiar.org/".into(),
//!         credentials: ClarisaCredentials {
//!             username: "replicator".into(),
//!             password: "secret".into(),
//!         },
//!         system_user_id: 1082,
//!     };
//!     let store = Arc::new(SqliteStore::open("/var/lib/clarisa/replica.db")?);
//!     let replicator = Replicator::from_config(&config, store)?;
//!
//!     let report = replicator.run_cycle().await?;
//!     println!("Inserted {} institutions", report.institutions.inserted());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::{ClarisaCredentials, CronCadence, ReplicationConfig};
pub use error::{ClarisaError, Result};
pub use models::{
    ClarisaCountryOffice, ClarisaInstitution, ClarisaInstitutionType, Institution,
    InstitutionLocation, LocElement, NewInstitutionLocation, Watermark,
};
pub use network::{ClarisaClient, ClarisaSource};
pub use store::{ReplicaStore, SqliteStore};
pub use sync::{
    spawn_schedule, CycleReport, PersistOutcome, Replicator, SyncEntity, SyncEvent, SyncPhase,
    SyncReport,
};
