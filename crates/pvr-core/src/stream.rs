//! Stream-level value types: elementary stream properties, seeking, signal
//! quality, and backend menu hooks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of elementary streams a backend reports for one stream.
pub const MAX_STREAMS: usize = 20;

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecType {
    Video,
    Audio,
    Subtitle,
    Teletext,
    Data,
}

/// One elementary stream inside the playing stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub pid: u32,
    pub codec_type: CodecType,
    /// Codec name (e.g. "h264", "ac3")
    pub codec: String,
    /// ISO 639-2 language code, empty if unknown
    pub language: String,
}

/// Properties of the playing stream, as reported by its backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProperties {
    pub streams: Vec<StreamInfo>,
}

impl StreamProperties {
    /// Returns the number of elementary streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if no elementary stream is known.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Origin for a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SeekWhence {
    /// From the start of the stream
    #[default]
    Set,
    /// From the current position
    Current,
    /// From the end of the stream
    End,
}

/// Tuner signal quality for the playing channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStatus {
    pub adapter_name: String,
    pub adapter_status: String,
    /// Signal-to-noise ratio, 0-100
    pub snr: u8,
    /// Signal strength, 0-100
    pub signal: u8,
    pub bit_error_rate: u32,
}

/// Category of a backend menu hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuHookCategory {
    Unknown,
    All,
    Channel,
    Timer,
    Epg,
    Recording,
    Setting,
}

/// A backend-defined action the user can trigger from a menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuHook {
    pub hook_id: u32,
    pub label: String,
    pub category: MenuHookCategory,
}

impl fmt::Display for MenuHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.hook_id)
    }
}
