//! Synchronization watermark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest local `updated_at`; remote records newer than it are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark(pub DateTime<Utc>);

impl Watermark {
    /// Value sent as the `from` query parameter.
    pub fn as_unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}
