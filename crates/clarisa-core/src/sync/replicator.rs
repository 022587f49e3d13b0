//! Replication cycle orchestration.
//!
//! A cycle looks up the watermark, then syncs institutions and afterwards
//! institution locations. Each entity sync walks
//! `FetchingRemote -> FetchingLocal -> Diffing -> (NoOp | Persisting) -> Done`.
//! Remote failures abort the cycle; store failures are logged and contained
//! to the entity sync they happened in.

use super::diff::{dedup_by_key, diff_by_key};
use super::mapper::{build_location_candidates, map_institution};
use super::messages::{SyncEntity, SyncEvent, SyncPhase};
use crate::config::ReplicationConfig;
use crate::error::{ClarisaError, Result};
use crate::models::{ClarisaInstitution, Watermark};
use crate::network::{ClarisaClient, ClarisaSource};
use crate::store::ReplicaStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Step of an entity sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    FetchingRemote,
    FetchingLocal,
    Diffing,
    NoOp,
    Persisting,
    Done,
}

/// What happened to the insert set of an entity sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Nothing new to insert.
    Skipped,
    Saved { count: usize },
    /// The batch insert failed and was rolled back.
    Failed { cause: String },
    /// A local lookup failed before anything could be diffed.
    Aborted { cause: String },
}

/// Result of syncing one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub entity: SyncEntity,
    /// Remote records considered after in-batch deduplication.
    pub fetched: usize,
    pub pending_update: usize,
    /// Local rows missing from the remote snapshot. Never acted upon.
    pub remove_candidates: usize,
    /// Country offices skipped for lack of a matching location element.
    pub unresolved: usize,
    pub outcome: PersistOutcome,
    pub events: Vec<SyncEvent>,
}

impl SyncReport {
    fn new(entity: SyncEntity) -> Self {
        Self {
            entity,
            fetched: 0,
            pending_update: 0,
            remove_candidates: 0,
            unresolved: 0,
            outcome: PersistOutcome::Skipped,
            events: Vec::new(),
        }
    }

    fn record(&mut self, event: SyncEvent) {
        event.log();
        self.events.push(event);
    }

    /// Rows written by this sync.
    pub fn inserted(&self) -> usize {
        match self.outcome {
            PersistOutcome::Saved { count } => count,
            _ => 0,
        }
    }

    /// How many events of `phase` were emitted.
    pub fn count_phase(&self, phase: SyncPhase) -> usize {
        self.events.iter().filter(|e| e.phase == phase).count()
    }
}

/// Result of a full replication cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Watermark the cycle fetched from; `None` means a full sync.
    pub watermark: Option<Watermark>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub institutions: SyncReport,
    pub locations: SyncReport,
}

/// Drives replication cycles from a Clarisa source into a replica store.
pub struct Replicator {
    source: Arc<dyn ClarisaSource>,
    store: Arc<dyn ReplicaStore>,
    system_user_id: i64,
    /// Held for the duration of a cycle.
    cycle_lock: Arc<Mutex<()>>,
}

impl Replicator {
    pub fn new(
        source: Arc<dyn ClarisaSource>,
        store: Arc<dyn ReplicaStore>,
        system_user_id: i64,
    ) -> Self {
        Self {
            source,
            store,
            system_user_id,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build a replicator talking to the configured Clarisa host.
    pub fn from_config(config: &ReplicationConfig, store: Arc<dyn ReplicaStore>) -> Result<Self> {
        let client = ClarisaClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), store, config.system_user_id))
    }

    /// Whether a cycle is currently in flight.
    pub fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    /// Run one cycle, reporting only whether it completed.
    pub async fn run_replication_cycle(&self) -> bool {
        match self.run_cycle().await {
            Ok(_) => true,
            Err(e) => {
                error!("Clarisa replication cycle failed: {}", e);
                false
            }
        }
    }

    /// Run one cycle, waiting for any cycle in flight to finish first.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        self.run_cycle_locked().await
    }

    /// Start one cycle on its own task unless another one is in flight, in
    /// which case `None`.
    ///
    /// The cycle runs to completion even if the returned handle is dropped.
    pub fn spawn_cycle(self: &Arc<Self>) -> Option<JoinHandle<Result<CycleReport>>> {
        let guard = Arc::clone(&self.cycle_lock).try_lock_owned().ok()?;
        let replicator = Arc::clone(self);
        Some(tokio::spawn(async move {
            let report = replicator.run_cycle_locked().await;
            drop(guard);
            report
        }))
    }

    async fn run_cycle_locked(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!("Starting Clarisa replication cycle");

        let watermark = self.find_watermark().await;
        match watermark {
            Some(mark) => info!("Fetching Clarisa changes since {}", mark.0.to_rfc3339()),
            None => info!("No sync watermark found, running a full sync"),
        }

        let institutions = self.sync_institutions(watermark).await?;
        let locations = self.sync_locations(watermark).await?;

        info!(
            "Clarisa replication cycle finished: {} institutions and {} locations inserted",
            institutions.inserted(),
            locations.inserted()
        );

        Ok(CycleReport {
            watermark,
            started_at,
            finished_at: Utc::now(),
            institutions,
            locations,
        })
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ReplicaStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| ClarisaError::database(format!("Store task failed: {}", e)))?
    }

    /// Latest `updated_at` of the replica. Lookup failures degrade to a full sync.
    async fn find_watermark(&self) -> Option<Watermark> {
        match self.with_store(|store| store.last_updated_institution()).await {
            Ok(row) => row.and_then(|inst| inst.updated_at).map(Watermark),
            Err(e) => {
                warn!("Failed to look up the sync watermark, running a full sync: {}", e);
                None
            }
        }
    }

    async fn fetch_remote(
        &self,
        entity: SyncEntity,
        watermark: Option<Watermark>,
    ) -> Result<Vec<ClarisaInstitution>> {
        enter(entity, SyncStage::FetchingRemote);
        let remote = self.source.fetch_institutions(watermark).await?;
        let deduped = dedup_by_key(&remote, |r| r.code);
        if deduped.len() < remote.len() {
            warn!(
                "Clarisa returned {} duplicate institution codes",
                remote.len() - deduped.len()
            );
        }
        Ok(deduped)
    }

    async fn sync_institutions(&self, watermark: Option<Watermark>) -> Result<SyncReport> {
        let entity = SyncEntity::Institution;
        let mut report = SyncReport::new(entity);

        let remote = self.fetch_remote(entity, watermark).await?;
        report.fetched = remote.len();

        enter(entity, SyncStage::FetchingLocal);
        let codes: Vec<i64> = remote.iter().map(|r| r.code).collect();
        let local = match self
            .with_store(move |store| store.find_institutions_by_ids(&codes))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Ok(abort(report, "local institutions", e)),
        };

        enter(entity, SyncStage::Diffing);
        let diff = diff_by_key(&remote, &local, |r| r.code, |l| l.id);
        self.note_matches(&mut report, diff.to_update.len(), diff.to_remove.len());

        if diff.is_noop() {
            report.record(SyncEvent::new(SyncPhase::NoDataCreate, entity));
            enter(entity, SyncStage::NoOp);
            enter(entity, SyncStage::Done);
            return Ok(report);
        }

        let now = Utc::now();
        let rows: Vec<_> = diff
            .to_insert
            .iter()
            .map(|r| map_institution(r, self.system_user_id, now))
            .collect();

        enter(entity, SyncStage::Persisting);
        self.persist(&mut report, rows, |store, rows| store.insert_institutions(rows))
            .await;
        enter(entity, SyncStage::Done);
        Ok(report)
    }

    async fn sync_locations(&self, watermark: Option<Watermark>) -> Result<SyncReport> {
        let entity = SyncEntity::InstitutionLocation;
        let mut report = SyncReport::new(entity);

        // Fetched again rather than reusing the institution snapshot.
        let remote = self.fetch_remote(entity, watermark).await?;
        report.fetched = remote.len();

        enter(entity, SyncStage::FetchingLocal);
        let elements = match self.with_store(|store| store.list_loc_elements()).await {
            Ok(rows) => rows,
            Err(e) => return Ok(abort(report, "location elements", e)),
        };
        let codes: Vec<i64> = remote.iter().map(|r| r.code).collect();
        let local = match self
            .with_store(move |store| store.find_locations_by_institution_ids(&codes))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Ok(abort(report, "local institution locations", e)),
        };

        enter(entity, SyncStage::Diffing);
        let resolution = build_location_candidates(&remote, &elements);
        report.unresolved = resolution.unresolved.len();
        if report.unresolved > 0 {
            for office in &resolution.unresolved {
                debug!(
                    "Institution {} office {} has no location element for {:?}",
                    office.institution_id, office.office_code, office.iso_alpha_2
                );
            }
            report.record(SyncEvent::counted(
                SyncPhase::Unresolved,
                entity,
                report.unresolved,
            ));
        }

        let diff = diff_by_key(
            &resolution.candidates,
            &local,
            |c| c.key(),
            |l| l.key(),
        );
        self.note_matches(&mut report, diff.to_update.len(), diff.to_remove.len());

        if diff.is_noop() {
            report.record(SyncEvent::new(SyncPhase::NoDataCreate, entity));
            enter(entity, SyncStage::NoOp);
            enter(entity, SyncStage::Done);
            return Ok(report);
        }

        enter(entity, SyncStage::Persisting);
        self.persist(&mut report, diff.to_insert, |store, rows| {
            store.insert_locations(rows)
        })
        .await;
        enter(entity, SyncStage::Done);
        Ok(report)
    }

    fn note_matches(&self, report: &mut SyncReport, pending_update: usize, remove: usize) {
        report.pending_update = pending_update;
        report.remove_candidates = remove;
        if pending_update > 0 {
            report.record(SyncEvent::counted(
                SyncPhase::PendingUpdate,
                report.entity,
                pending_update,
            ));
        }
        if remove > 0 {
            debug!(
                "{} local {} rows are no longer published by Clarisa",
                remove, report.entity
            );
        }
    }

    /// Insert a batch with START/CREATED, OK or ERROR, and FINALLY records.
    ///
    /// Failures are recorded in the report and never propagated.
    async fn persist<T>(
        &self,
        report: &mut SyncReport,
        rows: Vec<T>,
        insert: fn(&dyn ReplicaStore, &[T]) -> Result<usize>,
    ) where
        T: Send + 'static,
    {
        let entity = report.entity;
        report.record(SyncEvent::new(SyncPhase::Start, entity));
        report.record(SyncEvent::counted(SyncPhase::Created, entity, rows.len()));

        report.outcome = match self.with_store(move |store| insert(store, &rows)).await {
            Ok(count) => {
                report.record(SyncEvent::new(SyncPhase::Ok, entity));
                PersistOutcome::Saved { count }
            }
            Err(e) => {
                let cause = e.to_string();
                report.record(SyncEvent::failed(entity, cause.clone()));
                PersistOutcome::Failed { cause }
            }
        };

        report.record(SyncEvent::new(SyncPhase::Finally, entity));
    }
}

fn enter(entity: SyncEntity, stage: SyncStage) {
    debug!(entity = %entity, stage = ?stage, "sync stage");
}

fn abort(mut report: SyncReport, what: &str, err: ClarisaError) -> SyncReport {
    error!("Failed to load {} for {}: {}", what, report.entity, err);
    report.outcome = PersistOutcome::Aborted {
        cause: err.to_string(),
    };
    enter(report.entity, SyncStage::Done);
    report
}
