//! The single playback session.

use serde::Serialize;

use pvr_core::{Channel, ClientId, Recording};

/// Kind of stream being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    LiveTv,
    Recording,
}

/// What the session is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayingItem {
    Channel(Channel),
    Recording(Recording),
}

/// An open stream on one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub client_id: ClientId,
    /// Name shown for the playing client
    pub display_name: String,
    pub item: PlayingItem,
}

impl StreamSession {
    pub fn live(client_id: ClientId, display_name: impl Into<String>, channel: Channel) -> Self {
        Self {
            client_id,
            display_name: display_name.into(),
            item: PlayingItem::Channel(channel),
        }
    }

    pub fn recording(
        client_id: ClientId,
        display_name: impl Into<String>,
        recording: Recording,
    ) -> Self {
        Self {
            client_id,
            display_name: display_name.into(),
            item: PlayingItem::Recording(recording),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self.item {
            PlayingItem::Channel(_) => StreamKind::LiveTv,
            PlayingItem::Recording(_) => StreamKind::Recording,
        }
    }

    pub fn channel(&self) -> Option<&Channel> {
        match &self.item {
            PlayingItem::Channel(channel) => Some(channel),
            PlayingItem::Recording(_) => None,
        }
    }

    pub fn recording_item(&self) -> Option<&Recording> {
        match &self.item {
            PlayingItem::Recording(recording) => Some(recording),
            PlayingItem::Channel(_) => None,
        }
    }
}

/// Name shown for the client playing `channel`.
pub(crate) fn display_name_for(channel: &Channel, friendly_name: impl FnOnce() -> String) -> String {
    if channel.client_id.is_virtual() {
        "Virtual".to_string()
    } else if channel.is_virtual {
        "Unknown".to_string()
    } else {
        friendly_name()
    }
}
