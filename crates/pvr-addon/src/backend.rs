//! The capability-and-data API every backend module implements.
//!
//! A backend module wraps one DVR/TV backend (a tvheadend server, a
//! MythTV backend, an IPTV playlist, ...). The registry only ever talks to
//! modules through this trait.
//!
//! Optional operations have default implementations returning
//! [`BackendError::NotImplemented`], so a module only overrides what its
//! backend can actually do. Aggregate queries treat that code as "no
//! contribution" rather than an error.
//!
//! # Concurrency
//!
//! Implementations must be safe to call from the supervisor task and from
//! caller tasks at the same time. The registry never holds its own lock
//! while awaiting a backend call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pvr_core::{
    BackendError, BackendResult, Capabilities, Channel, ChannelGroup, ClientId, ConnectError,
    EpgEntry, GroupMember, MenuHook, Recording, SeekWhence, SignalStatus, StreamProperties, Timer,
};

/// A backend module as seen by the client registry.
#[async_trait]
pub trait PvrBackend: Send + Sync {
    // ------------------------------------------------------------------------
    // Identity and lifecycle
    // ------------------------------------------------------------------------

    /// Human readable name, usually including the backend host.
    fn friendly_name(&self) -> String;

    /// Features this module supports. Read once at registration.
    fn capabilities(&self) -> Capabilities;

    /// Returns false if the module lost its backend since `create`.
    fn is_ready(&self) -> bool {
        true
    }

    /// Brings the module online under the given client identity.
    async fn create(&self, client_id: ClientId) -> Result<(), ConnectError>;

    /// Releases every resource held by the module.
    async fn destroy(&self);

    // ------------------------------------------------------------------------
    // Channels and EPG
    // ------------------------------------------------------------------------

    async fn get_channels(&self, _radio: bool) -> BackendResult<Vec<Channel>> {
        Err(BackendError::NotImplemented)
    }

    async fn get_channel_groups(&self, _radio: bool) -> BackendResult<Vec<ChannelGroup>> {
        Err(BackendError::NotImplemented)
    }

    async fn get_channel_group_members(
        &self,
        _group: &ChannelGroup,
    ) -> BackendResult<Vec<GroupMember>> {
        Err(BackendError::NotImplemented)
    }

    async fn get_epg_for_channel(
        &self,
        _channel: &Channel,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> BackendResult<Vec<EpgEntry>> {
        Err(BackendError::NotImplemented)
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    async fn get_timers(&self) -> BackendResult<Vec<Timer>> {
        Err(BackendError::NotImplemented)
    }

    async fn add_timer(&self, _timer: &Timer) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn update_timer(&self, _timer: &Timer) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn delete_timer(&self, _timer: &Timer, _force: bool) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn rename_timer(&self, _timer: &Timer, _new_name: &str) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    // ------------------------------------------------------------------------
    // Recordings
    // ------------------------------------------------------------------------

    async fn get_recordings(&self) -> BackendResult<Vec<Recording>> {
        Err(BackendError::NotImplemented)
    }

    async fn rename_recording(&self, _recording: &Recording) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn delete_recording(&self, _recording: &Recording) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn set_recording_play_count(&self, _recording: &Recording, _count: u32) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn set_recording_last_played_position(
        &self,
        _recording: &Recording,
        _position: u32,
    ) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn get_recording_last_played_position(&self, _recording: &Recording) -> BackendResult<u32> {
        Err(BackendError::NotImplemented)
    }

    // ------------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------------

    /// Opens a live stream. `switching` is true when the open is part of a
    /// channel switch that had to close the previous stream first.
    async fn open_live_stream(&self, _channel: &Channel, _switching: bool) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn open_recording_stream(&self, _recording: &Recording) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn close_stream(&self) -> BackendResult<()> {
        Ok(())
    }

    async fn read_stream(&self, _buf: &mut [u8]) -> BackendResult<usize> {
        Err(BackendError::NotImplemented)
    }

    async fn seek_stream(&self, _offset: i64, _whence: SeekWhence) -> BackendResult<i64> {
        Err(BackendError::NotImplemented)
    }

    async fn stream_length(&self) -> BackendResult<i64> {
        Err(BackendError::NotImplemented)
    }

    async fn stream_position(&self) -> BackendResult<i64> {
        Err(BackendError::NotImplemented)
    }

    /// Switches the open live stream to another channel of this backend
    /// without closing it.
    async fn switch_channel(&self, _channel: &Channel) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    async fn stream_properties(&self) -> BackendResult<StreamProperties> {
        Err(BackendError::NotImplemented)
    }

    /// URL the player can open directly instead of reading through the module.
    async fn live_stream_url(&self, _channel: &Channel) -> BackendResult<String> {
        Err(BackendError::NotImplemented)
    }

    /// Refreshes and returns tuner signal information for the open stream.
    async fn update_signal_status(&self) -> BackendResult<SignalStatus> {
        Err(BackendError::NotImplemented)
    }

    // ------------------------------------------------------------------------
    // Channel scan and menu hooks
    // ------------------------------------------------------------------------

    async fn start_channel_scan(&self) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }

    fn menu_hooks(&self) -> Vec<MenuHook> {
        Vec::new()
    }

    async fn call_menu_hook(&self, _hook: &MenuHook) -> BackendResult<()> {
        Err(BackendError::NotImplemented)
    }
}
