//! Recordings stored on a backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ClientId;

/// A finished or in-progress recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Backend-assigned identifier
    pub recording_id: String,
    /// Client that owns the recording
    pub client_id: ClientId,
    pub title: String,
    /// Folder path inside the backend's recording tree
    pub directory: String,
    pub channel_name: String,
    pub start: Option<DateTime<Utc>>,
    /// Duration in seconds
    pub duration_secs: u32,
    pub play_count: u32,
    /// Resume point in seconds
    pub last_played_position: u32,
}

impl Recording {
    pub fn new(recording_id: impl Into<String>, client_id: ClientId, title: impl Into<String>) -> Self {
        Self {
            recording_id: recording_id.into(),
            client_id,
            title: title.into(),
            directory: String::new(),
            channel_name: String::new(),
            start: None,
            duration_secs: 0,
            play_count: 0,
            last_played_position: 0,
        }
    }
}
