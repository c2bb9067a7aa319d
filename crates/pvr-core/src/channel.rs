//! Channels, channel groups and group membership.

use serde::{Deserialize, Serialize};

use crate::ClientId;

/// A live TV or radio channel provided by one backend client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    /// Identifier of the channel inside its backend
    pub unique_id: u32,
    /// Client that owns this channel
    pub client_id: ClientId,
    /// Display name
    pub name: String,
    /// Channel number as announced by the backend
    pub number: u32,
    /// Radio channel rather than TV
    pub is_radio: bool,
    /// Channel not backed by a real backend module
    pub is_virtual: bool,
    /// External stream locator. When set, the channel is played through a
    /// separate playback path instead of the owning client's stream API.
    pub stream_url: Option<String>,
    /// Input format hint for the demuxer (e.g. "video/mp2t")
    pub input_format: String,
    /// Conditional access system id, 0 for free-to-air
    pub encryption_system: u32,
    /// A recording is currently running on this channel
    pub is_recording: bool,
    /// The backend can record this channel instantly
    pub can_record: bool,
}

impl Channel {
    /// Creates a channel with the required identity fields.
    pub fn new(unique_id: u32, client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            unique_id,
            client_id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Marks the channel as a radio channel.
    #[must_use]
    pub fn radio(mut self) -> Self {
        self.is_radio = true;
        self
    }

    /// Sets the external stream locator.
    #[must_use]
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    /// Returns the external stream locator if one is set and non-empty.
    pub fn external_url(&self) -> Option<&str> {
        self.stream_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Returns true if the channel is played through an external locator.
    pub fn has_external_url(&self) -> bool {
        self.external_url().is_some()
    }

    /// Returns true if the channel is scrambled.
    pub fn is_encrypted(&self) -> bool {
        self.encryption_system != 0
    }
}

/// Channels are the same channel when they share identity, owner and kind.
impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
            && self.client_id == other.client_id
            && self.is_radio == other.is_radio
    }
}

impl Eq for Channel {}

/// A channel group as published by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub name: String,
    pub is_radio: bool,
    pub client_id: ClientId,
}

impl ChannelGroup {
    pub fn new(name: impl Into<String>, is_radio: bool, client_id: ClientId) -> Self {
        Self {
            name: name.into(),
            is_radio,
            client_id,
        }
    }
}

/// Membership of a channel in a named group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_name: String,
    pub channel_uid: u32,
    pub channel_number: u32,
    pub client_id: ClientId,
}
