//! Stream session manager.
//!
//! At most one stream is open at a time. The session moves between three
//! states:
//!
//! ```text
//!            open_live / open_recording ok
//!   ┌──────┐ ─────────────────────────────▶ ┌────────────────────────┐
//!   │ Idle │                                │ Playing(kind, client)  │
//!   └──────┘ ◀───────────────────────────── └────────────────────────┘
//!      ▲        close_stream / client removed        │  ▲
//!      │                                             │  │ switch_channel
//!      │            switch failed while reopening    ▼  │
//!      └────────────────────────────────── ┌────────────────────┐
//!                                          │  SwitchInProgress  │
//!                                          └────────────────────┘
//! ```
//!
//! `SwitchInProgress` is the registry's switching flag, held by a
//! [`SwitchGuard`](guard::SwitchGuard) for exactly one attempt; a second
//! switch during that window fails with `SwitchBusy` instead of queueing.
//!
//! Open and close are not reentrant: callers must not open or close the
//! stream from two tasks at once.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use pvr_addon::SettingsStore;
use pvr_core::{
    Channel, ClientId, PvrError, PvrResult, Recording, SeekWhence, SignalStatus,
    StreamProperties, VideoSettings,
};

use crate::registry::{ClientHandle, Registry};

mod guard;
mod session;

pub(crate) use guard::SwitchGuard;
pub(crate) use session::display_name_for;
pub use session::{PlayingItem, StreamKind, StreamSession};

/// Result of a successful channel switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The old stream was closed and the target opened.
    Reopened,
    /// The target is already playing.
    Unchanged,
    /// The owning client switched its open stream in place.
    Switched,
    /// The stream was closed; the caller plays this URL directly.
    External(String),
}

/// What [`StreamManager::save_channel_settings`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Settings were not loaded for the playing channel, or nothing plays.
    Skipped,
    Saved,
    /// The settings equal the defaults and were removed from the store.
    Deleted,
}

/// Returns true if switching from `current` to `target` needs a full
/// close and reopen rather than an in-place switch.
fn needs_reopen(current: &Channel, target: &Channel) -> bool {
    current.client_id != target.client_id
        || current.is_radio != target.is_radio
        || current.has_external_url()
        || target.has_external_url()
}

/// Owns the open/switch/close protocol for the single playback session.
pub struct StreamManager {
    registry: Arc<Registry>,
    settings: Arc<dyn SettingsStore>,
}

impl StreamManager {
    pub fn new(registry: Arc<Registry>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { registry, settings }
    }

    // ========================================================================
    // Open / Switch / Close
    // ========================================================================

    /// Opens a live stream on the channel's owning client, closing any open
    /// stream first.
    ///
    /// # Errors
    ///
    /// `NotFound`/`ClientUnavailable` if the owning client cannot be used,
    /// or the backend error. The session is idle after a failure.
    pub async fn open_live(&self, channel: &Channel) -> PvrResult<()> {
        self.close_stream().await;
        self.open_live_on_owner(channel, false).await
    }

    async fn open_live_on_owner(&self, channel: &Channel, switching: bool) -> PvrResult<()> {
        let client = self.registry.lookup_connected(channel.client_id)?;

        if let Err(e) = client.backend().open_live_stream(channel, switching).await {
            error!(
                client_id = %client.id(),
                channel = %channel.name,
                error = %e,
                "Failed to open live stream"
            );
            return Err(PvrError::backend(client.id(), "open_live_stream", e));
        }

        let display_name = display_name_for(channel, || client.friendly_name());
        info!(
            client_id = %client.id(),
            channel = %channel.name,
            radio = channel.is_radio,
            "Live stream opened"
        );
        self.registry
            .open_session(StreamSession::live(client.id(), display_name, channel.clone()));
        Ok(())
    }

    /// Opens a recording on its owning client, closing any open stream first.
    ///
    /// # Errors
    ///
    /// As for [`StreamManager::open_live`].
    pub async fn open_recording(&self, recording: &Recording) -> PvrResult<()> {
        self.close_stream().await;

        let client = self.registry.lookup_connected(recording.client_id)?;
        if let Err(e) = client.backend().open_recording_stream(recording).await {
            error!(
                client_id = %client.id(),
                recording = %recording.title,
                error = %e,
                "Failed to open recording"
            );
            return Err(PvrError::backend(client.id(), "open_recording_stream", e));
        }

        info!(client_id = %client.id(), recording = %recording.title, "Recording opened");
        self.registry.open_session(StreamSession::recording(
            client.id(),
            client.friendly_name(),
            recording.clone(),
        ));
        Ok(())
    }

    /// Switches playback to `target`.
    ///
    /// A full reopen is used when nothing live is playing, the target lives
    /// on another client, the radio/TV kind differs, or either channel is
    /// played from an external URL. A target with an external URL is not
    /// opened: the stream is closed and the URL handed back.
    ///
    /// Cached channel settings are invalidated after every attempt.
    ///
    /// # Errors
    ///
    /// `SwitchBusy` if another switch is in progress; otherwise the lookup
    /// or backend error.
    pub async fn switch_channel(&self, target: &Channel) -> PvrResult<SwitchOutcome> {
        let Some(_guard) = SwitchGuard::acquire(&self.registry) else {
            debug!(channel = %target.name, "Channel switch already in progress");
            return Err(PvrError::SwitchBusy);
        };

        let result = self.switch_guarded(target).await;
        self.registry.set_settings_valid(false);

        match &result {
            Ok(outcome) => debug!(channel = %target.name, outcome = ?outcome, "Channel switched"),
            Err(e) => error!(
                channel = %target.name,
                client_id = %target.client_id,
                error = %e,
                "Failed to switch channel"
            ),
        }
        result
    }

    async fn switch_guarded(&self, target: &Channel) -> PvrResult<SwitchOutcome> {
        let current = self
            .registry
            .session()
            .and_then(|session| session.channel().cloned())
            .filter(|current| !needs_reopen(current, target));

        let Some(current) = current else {
            self.close_stream().await;
            if let Some(url) = target.external_url() {
                return Ok(SwitchOutcome::External(url.to_string()));
            }
            self.open_live_on_owner(target, true).await?;
            return Ok(SwitchOutcome::Reopened);
        };

        if current == *target {
            return Ok(SwitchOutcome::Unchanged);
        }

        let client = self.registry.lookup_connected(target.client_id)?;
        client
            .backend()
            .switch_channel(target)
            .await
            .map_err(|e| PvrError::backend(client.id(), "switch_channel", e))?;

        let display_name = display_name_for(target, || client.friendly_name());
        self.registry
            .update_session(StreamSession::live(client.id(), display_name, target.clone()));
        Ok(SwitchOutcome::Switched)
    }

    /// Closes the open stream. The session is idle afterwards whatever the
    /// backend answers.
    pub async fn close_stream(&self) {
        let Some(session) = self.registry.session() else {
            return;
        };

        match self.registry.lookup(session.client_id) {
            Ok(client) => {
                if let Err(e) = client.backend().close_stream().await {
                    warn!(client_id = %session.client_id, error = %e, "Backend failed to close stream");
                }
            }
            Err(e) => debug!(client_id = %session.client_id, error = %e, "Closing stream of departed client"),
        }

        self.registry.close_session();
        debug!(client_id = %session.client_id, "Stream closed");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Identity of the playing client, `ClientId::INVALID` when idle.
    pub fn current_client_id(&self) -> ClientId {
        self.registry.playing_client_id().unwrap_or(ClientId::INVALID)
    }

    pub fn session(&self) -> Option<StreamSession> {
        self.registry.session()
    }

    pub fn is_playing(&self) -> bool {
        self.registry.playing_client_id().is_some()
    }

    pub fn is_playing_live(&self) -> bool {
        self.playing_kind() == Some(StreamKind::LiveTv)
    }

    pub fn is_playing_recording(&self) -> bool {
        self.playing_kind() == Some(StreamKind::Recording)
    }

    pub fn is_playing_tv(&self) -> bool {
        self.playing_channel().is_some_and(|c| !c.is_radio)
    }

    pub fn is_playing_radio(&self) -> bool {
        self.playing_channel().is_some_and(|c| c.is_radio)
    }

    pub fn is_encrypted(&self) -> bool {
        self.playing_channel().is_some_and(|c| c.is_encrypted())
    }

    /// Display name of the playing client.
    pub fn playing_client_name(&self) -> Option<String> {
        self.registry.session().map(|s| s.display_name)
    }

    pub fn playing_channel(&self) -> Option<Channel> {
        self.registry
            .session()
            .and_then(|s| s.channel().cloned())
    }

    pub fn playing_recording(&self) -> Option<Recording> {
        self.registry
            .session()
            .and_then(|s| s.recording_item().cloned())
    }

    /// Input format of the playing channel, empty if unknown or idle.
    pub fn current_input_format(&self) -> String {
        self.playing_channel()
            .map(|c| c.input_format)
            .unwrap_or_default()
    }

    pub fn is_recording_on_playing_channel(&self) -> bool {
        self.playing_channel().is_some_and(|c| c.is_recording)
    }

    /// Returns true if the playing channel can be recorded right now.
    pub fn can_record_instantly(&self) -> bool {
        let Some(channel) = self.playing_channel() else {
            return false;
        };
        channel.can_record
            && self
                .registry
                .lookup_connected(channel.client_id)
                .is_ok_and(|client| client.capabilities().timers)
    }

    /// Last signal status reported for the open stream.
    pub fn signal_status(&self) -> Option<SignalStatus> {
        self.registry.signal()
    }

    fn playing_kind(&self) -> Option<StreamKind> {
        self.registry.session().map(|s| s.kind())
    }

    // ========================================================================
    // Stream I/O
    // ========================================================================

    fn playing_client(&self) -> PvrResult<Arc<ClientHandle>> {
        let id = self
            .registry
            .playing_client_id()
            .ok_or(PvrError::NoActiveStream)?;
        self.registry.lookup_connected(id)
    }

    pub async fn read_stream(&self, buf: &mut [u8]) -> PvrResult<usize> {
        let client = self.playing_client()?;
        client
            .backend()
            .read_stream(buf)
            .await
            .map_err(|e| PvrError::backend(client.id(), "read_stream", e))
    }

    pub async fn seek_stream(&self, offset: i64, whence: SeekWhence) -> PvrResult<i64> {
        let client = self.playing_client()?;
        client
            .backend()
            .seek_stream(offset, whence)
            .await
            .map_err(|e| PvrError::backend(client.id(), "seek_stream", e))
    }

    pub async fn stream_length(&self) -> PvrResult<i64> {
        let client = self.playing_client()?;
        client
            .backend()
            .stream_length()
            .await
            .map_err(|e| PvrError::backend(client.id(), "stream_length", e))
    }

    pub async fn stream_position(&self) -> PvrResult<i64> {
        let client = self.playing_client()?;
        client
            .backend()
            .stream_position()
            .await
            .map_err(|e| PvrError::backend(client.id(), "stream_position", e))
    }

    pub async fn stream_properties(&self) -> PvrResult<StreamProperties> {
        let client = self.playing_client()?;
        client
            .backend()
            .stream_properties()
            .await
            .map_err(|e| PvrError::backend(client.id(), "stream_properties", e))
    }

    // ========================================================================
    // Channel settings
    // ========================================================================

    /// Loads the playing channel's settings and marks them valid.
    ///
    /// Falls back to the defaults if nothing is stored or the store fails.
    ///
    /// # Errors
    ///
    /// `NoActiveStream` if no live channel is playing.
    pub fn load_channel_settings(&self) -> PvrResult<VideoSettings> {
        let channel = self.playing_channel().ok_or(PvrError::NoActiveStream)?;

        let settings = match self.settings.load(&channel) {
            Ok(Some(settings)) => settings,
            Ok(None) => VideoSettings::default(),
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "Failed to load channel settings");
                VideoSettings::default()
            }
        };

        self.registry.set_settings_valid(true);
        Ok(settings)
    }

    /// Persists `current` for the playing channel.
    ///
    /// Does nothing unless the settings were loaded since the channel was
    /// opened. Default settings are deleted rather than stored.
    ///
    /// # Errors
    ///
    /// `Store` if the settings store fails.
    pub fn save_channel_settings(&self, current: &VideoSettings) -> PvrResult<SettingsAction> {
        if !self.registry.settings_valid() {
            return Ok(SettingsAction::Skipped);
        }
        let Some(channel) = self.playing_channel() else {
            return Ok(SettingsAction::Skipped);
        };

        if current.is_default() {
            self.settings.delete(&channel)?;
            debug!(channel = %channel.name, "Channel settings reset to defaults");
            Ok(SettingsAction::Deleted)
        } else {
            self.settings.save(&channel, current)?;
            debug!(channel = %channel.name, "Channel settings saved");
            Ok(SettingsAction::Saved)
        }
    }
}
