//! Capability set advertised by a backend client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Features a backend client supports.
///
/// Resolved once when the client is registered and cached on its handle, so
/// capability predicates never call into the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub tv: bool,
    pub radio: bool,
    pub timers: bool,
    pub recordings: bool,
    pub recording_folders: bool,
    pub recording_play_count: bool,
    pub last_played_position: bool,
    pub epg: bool,
    pub channel_groups: bool,
    pub channel_scan: bool,
    /// The backend delivers the stream through its own read/seek calls
    pub handles_input_stream: bool,
    /// The backend demuxes the stream itself
    pub handles_demuxing: bool,
}

impl Capabilities {
    /// Everything a typical full-featured DVR backend offers.
    pub fn full() -> Self {
        Self {
            tv: true,
            radio: true,
            timers: true,
            recordings: true,
            recording_folders: true,
            recording_play_count: true,
            last_played_position: true,
            epg: true,
            channel_groups: true,
            channel_scan: true,
            handles_input_stream: true,
            handles_demuxing: false,
        }
    }

    /// Live TV only.
    pub fn live_tv() -> Self {
        Self {
            tv: true,
            handles_input_stream: true,
            ..Self::default()
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.tv, "tv"),
            (self.radio, "radio"),
            (self.timers, "timers"),
            (self.recordings, "recordings"),
            (self.epg, "epg"),
            (self.channel_groups, "groups"),
            (self.channel_scan, "scan"),
        ];
        let names: Vec<&str> = flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}
