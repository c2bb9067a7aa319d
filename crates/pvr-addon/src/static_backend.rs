//! A backend serving a fixed lineup from configuration.
//!
//! Useful for playlists of external streams and for running the daemon
//! without real DVR hardware. Streams are never read through the module:
//! every channel either carries an external URL or is opened and switched
//! in bookkeeping only.
//!
//! ```toml
//! [[backend]]
//! id = "pvr.iptv"
//! name = "IPTV playlist"
//!
//! [[backend.channels]]
//! uid = 1
//! name = "News 24"
//! number = 1
//! url = "http://iptv.example/news24.ts"
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pvr_core::{
    AddonId, BackendError, BackendResult, Capabilities, Channel, ChannelGroup, ClientId,
    ConnectError, GroupMember, Recording,
};

use crate::PvrBackend;

fn default_true() -> bool {
    true
}

/// Channel entry in a static backend's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticChannel {
    pub uid: u32,
    pub name: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub radio: bool,
    /// External stream locator
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub input_format: String,
}

/// Recording entry in a static backend's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRecording {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub channel: String,
}

/// Channel group entry in a static backend's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticGroup {
    pub name: String,
    #[serde(default)]
    pub radio: bool,
    /// Unique ids of member channels
    #[serde(default)]
    pub channels: Vec<u32>,
}

/// Configuration of one static backend (`[[backend]]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticBackendConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<StaticChannel>,
    #[serde(default)]
    pub recordings: Vec<StaticRecording>,
    #[serde(default)]
    pub groups: Vec<StaticGroup>,
}

impl StaticBackendConfig {
    pub fn addon_id(&self) -> AddonId {
        AddonId::new(self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Playing {
    Channel(u32),
    Recording(String),
}

#[derive(Debug, Default)]
struct StaticState {
    client_id: Option<ClientId>,
    playing: Option<Playing>,
}

/// Backend module serving the lineup described by a [`StaticBackendConfig`].
#[derive(Debug)]
pub struct StaticBackend {
    config: StaticBackendConfig,
    state: Mutex<StaticState>,
}

impl StaticBackend {
    pub fn new(config: StaticBackendConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StaticState::default()),
        }
    }

    pub fn config(&self) -> &StaticBackendConfig {
        &self.config
    }

    fn client_id(&self) -> BackendResult<ClientId> {
        self.state.lock().client_id.ok_or(BackendError::ServerError)
    }

    fn to_channel(&self, client_id: ClientId, entry: &StaticChannel) -> Channel {
        Channel {
            unique_id: entry.uid,
            client_id,
            name: entry.name.clone(),
            number: entry.number,
            is_radio: entry.radio,
            stream_url: entry.url.clone(),
            input_format: entry.input_format.clone(),
            ..Channel::default()
        }
    }

    fn find_channel(&self, channel: &Channel) -> Option<&StaticChannel> {
        self.config
            .channels
            .iter()
            .find(|c| c.uid == channel.unique_id && c.radio == channel.is_radio)
    }
}

#[async_trait]
impl PvrBackend for StaticBackend {
    fn friendly_name(&self) -> String {
        self.config.name.clone()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tv: self.config.channels.iter().any(|c| !c.radio),
            radio: self.config.channels.iter().any(|c| c.radio),
            recordings: !self.config.recordings.is_empty(),
            recording_folders: self.config.recordings.iter().any(|r| !r.directory.is_empty()),
            channel_groups: !self.config.groups.is_empty(),
            ..Capabilities::default()
        }
    }

    async fn create(&self, client_id: ClientId) -> Result<(), ConnectError> {
        debug!(
            addon = %self.config.id,
            client_id = %client_id,
            channels = self.config.channels.len(),
            "Static backend created"
        );
        let mut state = self.state.lock();
        state.client_id = Some(client_id);
        state.playing = None;
        Ok(())
    }

    async fn destroy(&self) {
        let mut state = self.state.lock();
        state.client_id = None;
        state.playing = None;
    }

    async fn get_channels(&self, radio: bool) -> BackendResult<Vec<Channel>> {
        let client_id = self.client_id()?;
        Ok(self
            .config
            .channels
            .iter()
            .filter(|c| c.radio == radio)
            .map(|c| self.to_channel(client_id, c))
            .collect())
    }

    async fn get_channel_groups(&self, radio: bool) -> BackendResult<Vec<ChannelGroup>> {
        if self.config.groups.is_empty() {
            return Err(BackendError::NotImplemented);
        }
        let client_id = self.client_id()?;
        Ok(self
            .config
            .groups
            .iter()
            .filter(|g| g.radio == radio)
            .map(|g| ChannelGroup::new(g.name.clone(), g.radio, client_id))
            .collect())
    }

    async fn get_channel_group_members(&self, group: &ChannelGroup) -> BackendResult<Vec<GroupMember>> {
        if self.config.groups.is_empty() {
            return Err(BackendError::NotImplemented);
        }
        let client_id = self.client_id()?;
        let Some(entry) = self
            .config
            .groups
            .iter()
            .find(|g| g.name == group.name && g.radio == group.is_radio)
        else {
            return Ok(Vec::new());
        };

        Ok(entry
            .channels
            .iter()
            .filter_map(|uid| self.config.channels.iter().find(|c| c.uid == *uid))
            .map(|c| GroupMember {
                group_name: entry.name.clone(),
                channel_uid: c.uid,
                channel_number: c.number,
                client_id,
            })
            .collect())
    }

    async fn get_recordings(&self) -> BackendResult<Vec<Recording>> {
        if self.config.recordings.is_empty() {
            return Err(BackendError::NotImplemented);
        }
        let client_id = self.client_id()?;
        Ok(self
            .config
            .recordings
            .iter()
            .map(|r| {
                let mut recording = Recording::new(r.id.clone(), client_id, r.title.clone());
                recording.directory = r.directory.clone();
                recording.channel_name = r.channel.clone();
                recording
            })
            .collect())
    }

    async fn open_live_stream(&self, channel: &Channel, _switching: bool) -> BackendResult<()> {
        if self.find_channel(channel).is_none() {
            return Err(BackendError::InvalidParameters);
        }
        self.state.lock().playing = Some(Playing::Channel(channel.unique_id));
        Ok(())
    }

    async fn open_recording_stream(&self, recording: &Recording) -> BackendResult<()> {
        if !self
            .config
            .recordings
            .iter()
            .any(|r| r.id == recording.recording_id)
        {
            return Err(BackendError::InvalidParameters);
        }
        self.state.lock().playing = Some(Playing::Recording(recording.recording_id.clone()));
        Ok(())
    }

    async fn close_stream(&self) -> BackendResult<()> {
        self.state.lock().playing = None;
        Ok(())
    }

    async fn switch_channel(&self, channel: &Channel) -> BackendResult<()> {
        if self.find_channel(channel).is_none() {
            return Err(BackendError::InvalidParameters);
        }
        let mut state = self.state.lock();
        match state.playing {
            Some(Playing::Channel(_)) => {
                state.playing = Some(Playing::Channel(channel.unique_id));
                Ok(())
            }
            _ => Err(BackendError::Failed),
        }
    }

    async fn live_stream_url(&self, channel: &Channel) -> BackendResult<String> {
        self.find_channel(channel)
            .and_then(|c| c.url.clone())
            .ok_or(BackendError::NotImplemented)
    }
}
