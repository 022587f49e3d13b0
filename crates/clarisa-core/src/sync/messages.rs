//! Structured lifecycle records of an entity sync.
//!
//! Control flow only produces [`SyncEvent`] values; the wording lives in the
//! `Display` impl. The texts are watched by operational monitoring and must
//! stay stable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity being replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncEntity {
    Institution,
    InstitutionLocation,
}

impl SyncEntity {
    /// Name used in log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEntity::Institution => "Institution",
            SyncEntity::InstitutionLocation => "InstitutionsLocations",
        }
    }
}

impl fmt::Display for SyncEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the sync lifecycle an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Start,
    Created,
    Ok,
    Error,
    Finally,
    NoDataCreate,
    PendingUpdate,
    Unresolved,
}

/// Severity an event is logged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub phase: SyncPhase,
    pub entity: SyncEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Underlying cause for `Error` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncEvent {
    pub fn new(phase: SyncPhase, entity: SyncEntity) -> Self {
        Self {
            phase,
            entity,
            count: None,
            detail: None,
        }
    }

    pub fn counted(phase: SyncPhase, entity: SyncEntity, count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::new(phase, entity)
        }
    }

    pub fn failed(entity: SyncEntity, cause: impl Into<String>) -> Self {
        Self {
            detail: Some(cause.into()),
            ..Self::new(SyncPhase::Error, entity)
        }
    }

    pub fn level(&self) -> EventLevel {
        match self.phase {
            SyncPhase::Error => EventLevel::Error,
            SyncPhase::Unresolved => EventLevel::Warn,
            _ => EventLevel::Info,
        }
    }

    /// Emit the event through `tracing` at its level.
    pub fn log(&self) {
        match (self.level(), &self.detail) {
            (EventLevel::Error, Some(cause)) => {
                tracing::error!(entity = %self.entity, "{}", self);
                tracing::error!(entity = %self.entity, "{}", cause);
            }
            (EventLevel::Error, None) => tracing::error!(entity = %self.entity, "{}", self),
            (EventLevel::Warn, _) => tracing::warn!(entity = %self.entity, "{}", self),
            (EventLevel::Info, _) => tracing::info!(entity = %self.entity, "{}", self),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = self.entity;
        let count = self.count.unwrap_or(0);
        match self.phase {
            SyncPhase::Start => write!(f, "Start saving data of {}", entity),
            SyncPhase::Created => write!(f, "{} elements created in {}", count, entity),
            SyncPhase::Ok => write!(f, "The data of {} was saved correctly", entity),
            SyncPhase::Error => write!(f, "Error saving data of {}", entity),
            SyncPhase::Finally => write!(f, "End saving data of {}", entity),
            SyncPhase::NoDataCreate => write!(f, "No data to create in {}", entity),
            SyncPhase::PendingUpdate => {
                write!(f, "{} elements pending to update in {}", count, entity)
            }
            SyncPhase::Unresolved => write!(
                f,
                "{} elements without a matching location in {}",
                count, entity
            ),
        }
    }
}
