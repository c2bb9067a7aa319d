//! Timers, recordings, channels, groups and EPG across all clients.
//!
//! Listing operations fan out to every connected client and return
//! [`Aggregated`] results. Operations on one entity go only to the client
//! named by the entity's `client_id` and return that client's answer as is;
//! other clients are never contacted. A target client that does not
//! advertise the capability an operation needs is answered with
//! `ClientUnavailable` without calling into its module.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;

use pvr_core::{
    Capabilities, Channel, ChannelGroup, ClientId, EpgEntry, GroupMember, MenuHook, PvrError, PvrResult,
    Recording, Timer,
};

use crate::aggregate::{fan_out, Aggregated};
use crate::registry::{ClientHandle, Registry};

/// Logs a failed single-target operation and passes the error on.
fn logged<T>(client: ClientId, operation: &'static str, result: PvrResult<T>) -> PvrResult<T> {
    if let Err(e) = &result {
        error!(client_id = %client, operation, error = %e, "Client operation failed");
    }
    result
}

/// Data operations over the registered clients.
pub struct DataService {
    registry: Arc<Registry>,
}

impl DataService {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn owner(&self, client: ClientId, operation: &'static str) -> PvrResult<Arc<ClientHandle>> {
        logged(client, operation, self.registry.lookup_connected(client))
    }

    /// Resolves the owning client and checks it advertises the capability.
    fn capable_owner(
        &self,
        client: ClientId,
        operation: &'static str,
        supports: fn(&Capabilities) -> bool,
    ) -> PvrResult<Arc<ClientHandle>> {
        let handle = self.owner(client, operation)?;
        if supports(&handle.capabilities()) {
            Ok(handle)
        } else {
            logged(client, operation, Err(PvrError::ClientUnavailable(client)))
        }
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    pub async fn get_timers(&self) -> Aggregated<Timer> {
        let snapshot = self.registry.connected_snapshot();
        fan_out(&snapshot, "get_timers", |client| async move {
            client.get_timers().await
        })
        .await
    }

    pub async fn get_recordings(&self) -> Aggregated<Recording> {
        let snapshot = self.registry.connected_snapshot();
        fan_out(&snapshot, "get_recordings", |client| async move {
            client.get_recordings().await
        })
        .await
    }

    pub async fn get_channels(&self, radio: bool) -> Aggregated<Channel> {
        let snapshot = self.registry.connected_snapshot();
        fan_out(&snapshot, "get_channels", |client| async move {
            client.get_channels(radio).await
        })
        .await
    }

    pub async fn get_channel_groups(&self, radio: bool) -> Aggregated<ChannelGroup> {
        let snapshot = self.registry.connected_snapshot();
        fan_out(&snapshot, "get_channel_groups", |client| async move {
            client.get_channel_groups(radio).await
        })
        .await
    }

    /// Members of `group` from every client. Groups are matched by name, so
    /// a group present on several backends merges their members.
    pub async fn get_channel_group_members(&self, group: &ChannelGroup) -> Aggregated<GroupMember> {
        let snapshot = self.registry.connected_snapshot();
        fan_out(&snapshot, "get_channel_group_members", |client| async move {
            client.get_channel_group_members(group).await
        })
        .await
    }

    /// Number of timers across all clients.
    pub async fn timer_count(&self) -> usize {
        self.get_timers().await.len()
    }

    /// Number of recordings across all clients.
    pub async fn recording_count(&self) -> usize {
        self.get_recordings().await.len()
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub async fn add_timer(&self, timer: &Timer) -> PvrResult<()> {
        let client = self.capable_owner(timer.client_id, "add_timer", |c| c.timers)?;
        let result = client
            .add_timer(timer)
            .await
            .map_err(|e| PvrError::backend(client.id(), "add_timer", e));
        logged(client.id(), "add_timer", result)
    }

    pub async fn update_timer(&self, timer: &Timer) -> PvrResult<()> {
        let client = self.capable_owner(timer.client_id, "update_timer", |c| c.timers)?;
        let result = client
            .update_timer(timer)
            .await
            .map_err(|e| PvrError::backend(client.id(), "update_timer", e));
        logged(client.id(), "update_timer", result)
    }

    /// Deletes a timer. Without `force` the backend may refuse to delete a
    /// timer that is recording.
    pub async fn delete_timer(&self, timer: &Timer, force: bool) -> PvrResult<()> {
        let client = self.capable_owner(timer.client_id, "delete_timer", |c| c.timers)?;
        let result = client
            .delete_timer(timer, force)
            .await
            .map_err(|e| PvrError::backend(client.id(), "delete_timer", e));
        logged(client.id(), "delete_timer", result)
    }

    pub async fn rename_timer(&self, timer: &Timer, new_name: &str) -> PvrResult<()> {
        let client = self.capable_owner(timer.client_id, "rename_timer", |c| c.timers)?;
        let result = client
            .rename_timer(timer, new_name)
            .await
            .map_err(|e| PvrError::backend(client.id(), "rename_timer", e));
        logged(client.id(), "rename_timer", result)
    }

    // ========================================================================
    // Recordings
    // ========================================================================

    /// Renames a recording to `recording.title`.
    pub async fn rename_recording(&self, recording: &Recording) -> PvrResult<()> {
        let client = self.capable_owner(recording.client_id, "rename_recording", |c| c.recordings)?;
        let result = client
            .rename_recording(recording)
            .await
            .map_err(|e| PvrError::backend(client.id(), "rename_recording", e));
        logged(client.id(), "rename_recording", result)
    }

    pub async fn delete_recording(&self, recording: &Recording) -> PvrResult<()> {
        let client = self.capable_owner(recording.client_id, "delete_recording", |c| c.recordings)?;
        let result = client
            .delete_recording(recording)
            .await
            .map_err(|e| PvrError::backend(client.id(), "delete_recording", e));
        logged(client.id(), "delete_recording", result)
    }

    /// # Errors
    ///
    /// `ClientUnavailable` if the client does not keep play counts.
    pub async fn set_recording_play_count(&self, recording: &Recording, count: u32) -> PvrResult<()> {
        const OP: &str = "set_recording_play_count";
        let client = self.capable_owner(recording.client_id, OP, |c| c.recording_play_count)?;
        let result = client
            .backend()
            .set_recording_play_count(recording, count)
            .await
            .map_err(|e| PvrError::backend(client.id(), OP, e));
        logged(client.id(), OP, result)
    }

    /// # Errors
    ///
    /// `ClientUnavailable` if the client does not keep playback positions.
    pub async fn set_recording_last_played_position(
        &self,
        recording: &Recording,
        position: u32,
    ) -> PvrResult<()> {
        const OP: &str = "set_recording_last_played_position";
        let client = self.capable_owner(recording.client_id, OP, |c| c.last_played_position)?;
        let result = client
            .backend()
            .set_recording_last_played_position(recording, position)
            .await
            .map_err(|e| PvrError::backend(client.id(), OP, e));
        logged(client.id(), OP, result)
    }

    /// # Errors
    ///
    /// `ClientUnavailable` if the client does not keep playback positions.
    pub async fn get_recording_last_played_position(&self, recording: &Recording) -> PvrResult<u32> {
        const OP: &str = "get_recording_last_played_position";
        let client = self.capable_owner(recording.client_id, OP, |c| c.last_played_position)?;
        let result = client
            .backend()
            .get_recording_last_played_position(recording)
            .await
            .map_err(|e| PvrError::backend(client.id(), OP, e));
        logged(client.id(), OP, result)
    }

    // ========================================================================
    // Channels and EPG
    // ========================================================================

    /// Programme guide of one channel in `[start, end)`.
    pub async fn get_epg_for_channel(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PvrResult<Vec<EpgEntry>> {
        let client = self.capable_owner(channel.client_id, "get_epg_for_channel", |c| c.epg)?;
        let result = client
            .get_epg_for_channel(channel, start, end)
            .await
            .map_err(|e| PvrError::backend(client.id(), "get_epg_for_channel", e));
        logged(client.id(), "get_epg_for_channel", result)
    }

    /// URL the player can open directly for `channel`.
    pub async fn live_stream_url(&self, channel: &Channel) -> PvrResult<String> {
        if let Some(url) = channel.external_url() {
            return Ok(url.to_string());
        }
        let client = self.owner(channel.client_id, "live_stream_url")?;
        let result = client
            .backend()
            .live_stream_url(channel)
            .await
            .map_err(|e| PvrError::backend(client.id(), "live_stream_url", e));
        logged(client.id(), "live_stream_url", result)
    }

    // ========================================================================
    // Menu hooks
    // ========================================================================

    /// Resolves `client`, defaulting to the playing client.
    fn menu_client(&self, client: Option<ClientId>) -> PvrResult<Arc<ClientHandle>> {
        let id = match client {
            Some(id) => id,
            None => self
                .registry
                .playing_client_id()
                .ok_or(PvrError::NoActiveStream)?,
        };
        self.owner(id, "menu_hooks")
    }

    /// Menu hooks of `client`, or of the playing client for `None`.
    pub fn menu_hooks(&self, client: Option<ClientId>) -> PvrResult<Vec<MenuHook>> {
        Ok(self.menu_client(client)?.backend().menu_hooks())
    }

    /// Returns true if `client` (or the playing client) offers menu hooks.
    pub fn has_menu_hooks(&self, client: Option<ClientId>) -> bool {
        self.menu_hooks(client).is_ok_and(|hooks| !hooks.is_empty())
    }

    pub async fn call_menu_hook(&self, client: Option<ClientId>, hook: &MenuHook) -> PvrResult<()> {
        let client = self.menu_client(client)?;
        let result = client
            .backend()
            .call_menu_hook(hook)
            .await
            .map_err(|e| PvrError::backend(client.id(), "call_menu_hook", e));
        logged(client.id(), "call_menu_hook", result)
    }
}
