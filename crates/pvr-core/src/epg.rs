//! Electronic programme guide entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One broadcast in a channel's programme guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgEntry {
    pub broadcast_id: u32,
    pub channel_uid: u32,
    pub title: String,
    pub plot: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub genre: Option<String>,
}

impl EpgEntry {
    /// Returns true if the broadcast overlaps the half-open range `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && self.end > from
    }
}
