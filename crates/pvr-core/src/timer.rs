//! Recording timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ClientId;

/// Lifecycle state of a timer as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    #[default]
    Scheduled,
    Recording,
    Completed,
    Cancelled,
    Conflict,
    Error,
}

impl TimerState {
    /// Returns true while the timer is still pending or running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::Recording | Self::Conflict)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scheduled => "scheduled",
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Conflict => "conflict",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// A scheduled recording on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Backend-assigned index
    pub index: u32,
    /// Client that owns the timer
    pub client_id: ClientId,
    /// Unique id of the channel to record
    pub channel_uid: u32,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: TimerState,
    pub is_radio: bool,
}

impl Timer {
    pub fn new(
        index: u32,
        client_id: ClientId,
        channel_uid: u32,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            client_id,
            channel_uid,
            title: title.into(),
            start,
            end,
            state: TimerState::Scheduled,
            is_radio: false,
        }
    }
}
