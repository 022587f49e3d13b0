//! Recurring replication.

use super::replicator::Replicator;
use crate::config::CronCadence;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Run a replication cycle every `cadence` period until the task is aborted.
///
/// The first cycle runs one full period after spawning. A tick that fires
/// while a cycle is still in flight is skipped, as are ticks missed while
/// the previous cycle ran long.
pub fn spawn_schedule(replicator: Arc<Replicator>, cadence: CronCadence) -> JoinHandle<()> {
    let period = cadence.interval();
    info!("Scheduling Clarisa replication every {}", cadence);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let Some(handle) = replicator.spawn_cycle() else {
                warn!("Previous Clarisa replication cycle still running, skipping tick");
                continue;
            };
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Scheduled Clarisa replication cycle failed: {}", e),
                Err(e) => error!("Scheduled Clarisa replication task failed: {}", e),
            }
        }
    })
}
