//! Centralized configuration for the replication engine.
//!
//! Constants live in zero-sized config structs; values supplied at runtime
//! (host, credentials, service account) live in [`ReplicationConfig`].

use crate::error::{ClarisaError, Result};
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CLARISA_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
    pub const CLARISA_API_PREFIX: &'static str = "api/";
    pub const USER_AGENT: &'static str = "Clarisa-Replicator/1.0";
}

/// Replication tuning.
pub struct SyncConfig;

impl SyncConfig {
    /// Remote query used for both entity syncs.
    pub const INSTITUTIONS_PATH: &'static str = "institutions?show=all";
    /// Upper bound of bound parameters in one `IN (...)` lookup.
    pub const LOOKUP_CHUNK_SIZE: usize = 500;
    pub const DEFAULT_CADENCE: CronCadence = CronCadence::Every8Hours;
}

/// Basic-auth credentials for the Clarisa API.
#[derive(Clone)]
pub struct ClarisaCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ClarisaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarisaCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime settings of a replicator.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Base URL of the Clarisa host, e.g. `https://api.clarisa.cgiar.org/`.
    pub host: String,
    pub credentials: ClarisaCredentials,
    /// Service-account id written to `created_by`/`updated_by`.
    pub system_user_id: i64,
}

/// Named cadences accepted for the scheduled trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronCadence {
    EveryMinute,
    Every10Minutes,
    Every30Minutes,
    EveryHour,
    Every2Hours,
    Every4Hours,
    Every8Hours,
    Every12Hours,
    EveryDay,
}

impl CronCadence {
    pub const ALL: [CronCadence; 9] = [
        CronCadence::EveryMinute,
        CronCadence::Every10Minutes,
        CronCadence::Every30Minutes,
        CronCadence::EveryHour,
        CronCadence::Every2Hours,
        CronCadence::Every4Hours,
        CronCadence::Every8Hours,
        CronCadence::Every12Hours,
        CronCadence::EveryDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CronCadence::EveryMinute => "1m",
            CronCadence::Every10Minutes => "10m",
            CronCadence::Every30Minutes => "30m",
            CronCadence::EveryHour => "1h",
            CronCadence::Every2Hours => "2h",
            CronCadence::Every4Hours => "4h",
            CronCadence::Every8Hours => "8h",
            CronCadence::Every12Hours => "12h",
            CronCadence::EveryDay => "1d",
        }
    }

    pub fn interval(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        let secs = match self {
            CronCadence::EveryMinute => MINUTE,
            CronCadence::Every10Minutes => 10 * MINUTE,
            CronCadence::Every30Minutes => 30 * MINUTE,
            CronCadence::EveryHour => HOUR,
            CronCadence::Every2Hours => 2 * HOUR,
            CronCadence::Every4Hours => 4 * HOUR,
            CronCadence::Every8Hours => 8 * HOUR,
            CronCadence::Every12Hours => 12 * HOUR,
            CronCadence::EveryDay => 24 * HOUR,
        };
        Duration::from_secs(secs)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Names of every supported cadence, in ascending order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl Default for CronCadence {
    fn default() -> Self {
        SyncConfig::DEFAULT_CADENCE
    }
}

impl std::fmt::Display for CronCadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CronCadence {
    type Err = ClarisaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| ClarisaError::Config {
            message: format!(
                "unknown cadence '{}', expected one of: {}",
                s,
                Self::names().join(", ")
            ),
        })
    }
}
