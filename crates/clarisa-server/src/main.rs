//! Clarisa Server - replicates Clarisa institutions on a schedule and on demand.
//!
//! Runs the replication engine from `clarisa-core` behind an HTTP trigger
//! (`GET /api/clarisa/cloning`) and a fixed-cadence scheduler.

mod handler;
mod server;

use anyhow::{bail, Result};
use clap::Parser;
use clarisa_core::{ClarisaCredentials, CronCadence, ReplicationConfig, Replicator, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "clarisa-server")]
#[command(about = "Replicates Clarisa institutions into a local database")]
struct Args {
    /// Base URL of the Clarisa host
    #[arg(long, env = "CLARISA_HOST")]
    clarisa_host: String,

    /// Clarisa API username
    #[arg(long, env = "CLARISA_USERNAME")]
    clarisa_username: String,

    /// Clarisa API password
    #[arg(long, env = "CLARISA_PASSWORD", hide_env_values = true)]
    clarisa_password: String,

    /// User id recorded as creator of replicated rows
    #[arg(long, env = "USER_AICCRA")]
    system_user_id: i64,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "clarisa-replica.db")]
    db_path: PathBuf,

    /// Replication cadence (1m, 10m, 30m, 1h, 2h, 4h, 8h, 12h, 1d)
    #[arg(long, env = "CRON_TIME", default_value = "8h")]
    cron_time: CronCadence,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Do not schedule recurring cycles
    #[arg(long)]
    no_schedule: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Clarisa Server");
    info!("Replica database: {}", args.db_path.display());

    let config = ReplicationConfig {
        host: args.clarisa_host,
        credentials: ClarisaCredentials {
            username: args.clarisa_username,
            password: args.clarisa_password,
        },
        system_user_id: args.system_user_id,
    };

    let store = Arc::new(SqliteStore::open(&args.db_path)?);
    let replicator = Arc::new(Replicator::from_config(&config, store)?);

    if args.once {
        if !replicator.run_replication_cycle().await {
            bail!("Clarisa replication cycle failed");
        }
        return Ok(());
    }

    let schedule = if args.no_schedule {
        info!("Scheduled replication disabled");
        None
    } else {
        Some(clarisa_core::spawn_schedule(replicator.clone(), args.cron_time))
    };

    let addr = server::start_server(replicator, &args.host, args.port).await?;
    info!("Clarisa server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    if let Some(handle) = schedule {
        handle.abort();
    }

    Ok(())
}
