//! Scriptable backend for tests.
//!
//! Enabled for this crate's own tests and for dependents through the
//! `test-util` feature. Every call is recorded by operation name; any
//! operation can be made to fail with a chosen code or to block until the
//! test releases it.
//!
//! Data handed to the builders may carry any client id: the mock stamps the
//! identity it was created under onto everything it returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use pvr_core::{
    BackendError, BackendResult, Capabilities, Channel, ChannelGroup, ClientId, ConnectError,
    EpgEntry, GroupMember, MenuHook, Recording, SeekWhence, SignalStatus, StreamProperties, Timer,
};

use crate::PvrBackend;

/// Handles for an operation held open by [`MockBackend::block`].
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// Notified once the operation has been entered
    pub entered: Arc<Notify>,
    /// Notify to let the operation continue
    pub release: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockState {
    client_id: Option<ClientId>,
    ready: bool,
    ready_delay: Option<Duration>,
    connect_error: Option<ConnectError>,
    failures: HashMap<&'static str, BackendError>,
    blocks: HashMap<&'static str, Block>,
    calls: Vec<&'static str>,

    channels: Vec<Channel>,
    groups: Vec<ChannelGroup>,
    members: Vec<GroupMember>,
    epg: Vec<EpgEntry>,
    timers: Vec<Timer>,
    recordings: Vec<Recording>,
    menu_hooks: Vec<MenuHook>,

    playing_channel: Option<Channel>,
    playing_recording: Option<Recording>,
    stream_data: Vec<u8>,
    position: usize,
    properties: StreamProperties,
    signal: SignalStatus,
}

/// In-process backend whose behaviour is set up by the test.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    capabilities: Capabilities,
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a mock advertising [`Capabilities::full`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::full(),
            state: Mutex::new(MockState {
                ready: true,
                ..MockState::default()
            }),
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_channels(self, channels: Vec<Channel>) -> Self {
        self.state.lock().channels = channels;
        self
    }

    #[must_use]
    pub fn with_groups(self, groups: Vec<ChannelGroup>, members: Vec<GroupMember>) -> Self {
        {
            let mut state = self.state.lock();
            state.groups = groups;
            state.members = members;
        }
        self
    }

    #[must_use]
    pub fn with_epg(self, epg: Vec<EpgEntry>) -> Self {
        self.state.lock().epg = epg;
        self
    }

    #[must_use]
    pub fn with_timers(self, timers: Vec<Timer>) -> Self {
        self.state.lock().timers = timers;
        self
    }

    #[must_use]
    pub fn with_recordings(self, recordings: Vec<Recording>) -> Self {
        self.state.lock().recordings = recordings;
        self
    }

    #[must_use]
    pub fn with_menu_hooks(self, hooks: Vec<MenuHook>) -> Self {
        self.state.lock().menu_hooks = hooks;
        self
    }

    /// Bytes served by `read_stream` once a stream is open.
    #[must_use]
    pub fn with_stream_data(self, data: Vec<u8>) -> Self {
        self.state.lock().stream_data = data;
        self
    }

    #[must_use]
    pub fn with_stream_properties(self, properties: StreamProperties) -> Self {
        self.state.lock().properties = properties;
        self
    }

    #[must_use]
    pub fn with_signal(self, signal: SignalStatus) -> Self {
        self.state.lock().signal = signal;
        self
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    /// Makes `operation` fail with `error` until [`MockBackend::succeed`].
    pub fn fail(&self, operation: &'static str, error: BackendError) {
        self.state.lock().failures.insert(operation, error);
    }

    /// Clears a failure set with [`MockBackend::fail`].
    pub fn succeed(&self, operation: &'static str) {
        self.state.lock().failures.remove(operation);
    }

    /// Makes `create` fail with `error`.
    pub fn fail_connect(&self, error: ConnectError) {
        self.state.lock().connect_error = Some(error);
    }

    /// Lets `create` succeed again.
    pub fn connect_ok(&self) {
        self.state.lock().connect_error = None;
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    /// Makes every `is_ready` check stall the calling thread for `delay`.
    pub fn set_ready_delay(&self, delay: Duration) {
        self.state.lock().ready_delay = Some(delay);
    }

    /// Holds `operation` open until the returned block is released.
    pub fn block(&self, operation: &'static str) -> Block {
        let block = Block::default();
        self.state.lock().blocks.insert(operation, block.clone());
        block
    }

    /// Removes a block so later calls run straight through.
    pub fn unblock(&self, operation: &'static str) {
        self.state.lock().blocks.remove(operation);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Every operation called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == operation).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Identity passed to the last successful `create`, until `destroy`.
    pub fn client_id(&self) -> Option<ClientId> {
        self.state.lock().client_id
    }

    pub fn timers(&self) -> Vec<Timer> {
        self.state.lock().timers.clone()
    }

    pub fn recordings(&self) -> Vec<Recording> {
        self.state.lock().recordings.clone()
    }

    pub fn playing_channel(&self) -> Option<Channel> {
        self.state.lock().playing_channel.clone()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Records the call, waits on any block, then applies scripted failures.
    async fn enter(&self, operation: &'static str) -> BackendResult<()> {
        let block = {
            let mut state = self.state.lock();
            state.calls.push(operation);
            state.blocks.get(operation).cloned()
        };

        if let Some(block) = block {
            block.entered.notify_one();
            block.release.notified().await;
        }

        match self.state.lock().failures.get(operation) {
            Some(error) => Err(*error),
            None => Ok(()),
        }
    }

    fn stamp(&self) -> ClientId {
        self.state.lock().client_id.unwrap_or(ClientId::INVALID)
    }
}

#[async_trait]
impl PvrBackend for MockBackend {
    fn friendly_name(&self) -> String {
        self.name.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn is_ready(&self) -> bool {
        let (ready, delay) = {
            let state = self.state.lock();
            (state.ready, state.ready_delay)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        ready
    }

    async fn create(&self, client_id: ClientId) -> Result<(), ConnectError> {
        let mut state = self.state.lock();
        state.calls.push("create");
        if let Some(error) = state.connect_error.clone() {
            return Err(error);
        }
        state.client_id = Some(client_id);
        Ok(())
    }

    async fn destroy(&self) {
        let mut state = self.state.lock();
        state.calls.push("destroy");
        state.client_id = None;
        state.playing_channel = None;
        state.playing_recording = None;
    }

    async fn get_channels(&self, radio: bool) -> BackendResult<Vec<Channel>> {
        self.enter("get_channels").await?;
        let client_id = self.stamp();
        Ok(self
            .state
            .lock()
            .channels
            .iter()
            .filter(|c| c.is_radio == radio)
            .map(|c| Channel {
                client_id,
                ..c.clone()
            })
            .collect())
    }

    async fn get_channel_groups(&self, radio: bool) -> BackendResult<Vec<ChannelGroup>> {
        self.enter("get_channel_groups").await?;
        let client_id = self.stamp();
        Ok(self
            .state
            .lock()
            .groups
            .iter()
            .filter(|g| g.is_radio == radio)
            .map(|g| ChannelGroup::new(g.name.clone(), g.is_radio, client_id))
            .collect())
    }

    async fn get_channel_group_members(&self, group: &ChannelGroup) -> BackendResult<Vec<GroupMember>> {
        self.enter("get_channel_group_members").await?;
        let client_id = self.stamp();
        Ok(self
            .state
            .lock()
            .members
            .iter()
            .filter(|m| m.group_name == group.name)
            .map(|m| GroupMember {
                client_id,
                ..m.clone()
            })
            .collect())
    }

    async fn get_epg_for_channel(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BackendResult<Vec<EpgEntry>> {
        self.enter("get_epg_for_channel").await?;
        Ok(self
            .state
            .lock()
            .epg
            .iter()
            .filter(|e| e.channel_uid == channel.unique_id && e.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn get_timers(&self) -> BackendResult<Vec<Timer>> {
        self.enter("get_timers").await?;
        let client_id = self.stamp();
        Ok(self
            .state
            .lock()
            .timers
            .iter()
            .map(|t| Timer {
                client_id,
                ..t.clone()
            })
            .collect())
    }

    async fn add_timer(&self, timer: &Timer) -> BackendResult<()> {
        self.enter("add_timer").await?;
        let mut state = self.state.lock();
        if state.timers.iter().any(|t| t.index == timer.index) {
            return Err(BackendError::AlreadyPresent);
        }
        state.timers.push(timer.clone());
        Ok(())
    }

    async fn update_timer(&self, timer: &Timer) -> BackendResult<()> {
        self.enter("update_timer").await?;
        let mut state = self.state.lock();
        let existing = state
            .timers
            .iter_mut()
            .find(|t| t.index == timer.index)
            .ok_or(BackendError::InvalidParameters)?;
        *existing = timer.clone();
        Ok(())
    }

    async fn delete_timer(&self, timer: &Timer, force: bool) -> BackendResult<()> {
        self.enter("delete_timer").await?;
        let mut state = self.state.lock();
        let running = state
            .timers
            .iter()
            .any(|t| t.index == timer.index && t.state == pvr_core::TimerState::Recording);
        if running && !force {
            return Err(BackendError::RecordingRunning);
        }
        state.timers.retain(|t| t.index != timer.index);
        Ok(())
    }

    async fn rename_timer(&self, timer: &Timer, new_name: &str) -> BackendResult<()> {
        self.enter("rename_timer").await?;
        let mut state = self.state.lock();
        let existing = state
            .timers
            .iter_mut()
            .find(|t| t.index == timer.index)
            .ok_or(BackendError::InvalidParameters)?;
        existing.title = new_name.to_string();
        Ok(())
    }

    async fn get_recordings(&self) -> BackendResult<Vec<Recording>> {
        self.enter("get_recordings").await?;
        let client_id = self.stamp();
        Ok(self
            .state
            .lock()
            .recordings
            .iter()
            .map(|r| Recording {
                client_id,
                ..r.clone()
            })
            .collect())
    }

    async fn rename_recording(&self, recording: &Recording) -> BackendResult<()> {
        self.enter("rename_recording").await?;
        self.with_recording(recording, |r| r.title = recording.title.clone())
    }

    async fn delete_recording(&self, recording: &Recording) -> BackendResult<()> {
        self.enter("delete_recording").await?;
        let mut state = self.state.lock();
        let before = state.recordings.len();
        state
            .recordings
            .retain(|r| r.recording_id != recording.recording_id);
        if state.recordings.len() == before {
            return Err(BackendError::InvalidParameters);
        }
        Ok(())
    }

    async fn set_recording_play_count(&self, recording: &Recording, count: u32) -> BackendResult<()> {
        self.enter("set_recording_play_count").await?;
        self.with_recording(recording, |r| r.play_count = count)
    }

    async fn set_recording_last_played_position(
        &self,
        recording: &Recording,
        position: u32,
    ) -> BackendResult<()> {
        self.enter("set_recording_last_played_position").await?;
        self.with_recording(recording, |r| r.last_played_position = position)
    }

    async fn get_recording_last_played_position(&self, recording: &Recording) -> BackendResult<u32> {
        self.enter("get_recording_last_played_position").await?;
        self.state
            .lock()
            .recordings
            .iter()
            .find(|r| r.recording_id == recording.recording_id)
            .map(|r| r.last_played_position)
            .ok_or(BackendError::InvalidParameters)
    }

    async fn open_live_stream(&self, channel: &Channel, _switching: bool) -> BackendResult<()> {
        self.enter("open_live_stream").await?;
        let mut state = self.state.lock();
        state.playing_channel = Some(channel.clone());
        state.playing_recording = None;
        state.position = 0;
        Ok(())
    }

    async fn open_recording_stream(&self, recording: &Recording) -> BackendResult<()> {
        self.enter("open_recording_stream").await?;
        let mut state = self.state.lock();
        state.playing_recording = Some(recording.clone());
        state.playing_channel = None;
        state.position = 0;
        Ok(())
    }

    async fn close_stream(&self) -> BackendResult<()> {
        self.enter("close_stream").await?;
        let mut state = self.state.lock();
        state.playing_channel = None;
        state.playing_recording = None;
        Ok(())
    }

    async fn read_stream(&self, buf: &mut [u8]) -> BackendResult<usize> {
        self.enter("read_stream").await?;
        let mut state = self.state.lock();
        let start = state.position.min(state.stream_data.len());
        let available = state.stream_data.get(start..).unwrap_or_default();
        let n = available.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), available.get(..n)) {
            dst.copy_from_slice(src);
        }
        state.position = start + n;
        Ok(n)
    }

    async fn seek_stream(&self, offset: i64, whence: SeekWhence) -> BackendResult<i64> {
        self.enter("seek_stream").await?;
        let mut state = self.state.lock();
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Current => state.position as i64,
            SeekWhence::End => state.stream_data.len() as i64,
        };
        let target = base + offset;
        if target < 0 || target > state.stream_data.len() as i64 {
            return Err(BackendError::InvalidParameters);
        }
        state.position = target as usize;
        Ok(target)
    }

    async fn stream_length(&self) -> BackendResult<i64> {
        self.enter("stream_length").await?;
        Ok(self.state.lock().stream_data.len() as i64)
    }

    async fn stream_position(&self) -> BackendResult<i64> {
        self.enter("stream_position").await?;
        Ok(self.state.lock().position as i64)
    }

    async fn switch_channel(&self, channel: &Channel) -> BackendResult<()> {
        self.enter("switch_channel").await?;
        let mut state = self.state.lock();
        if state.playing_channel.is_none() {
            return Err(BackendError::Failed);
        }
        state.playing_channel = Some(channel.clone());
        Ok(())
    }

    async fn stream_properties(&self) -> BackendResult<StreamProperties> {
        self.enter("stream_properties").await?;
        Ok(self.state.lock().properties.clone())
    }

    async fn live_stream_url(&self, channel: &Channel) -> BackendResult<String> {
        self.enter("live_stream_url").await?;
        channel
            .external_url()
            .map(str::to_string)
            .ok_or(BackendError::NotImplemented)
    }

    async fn update_signal_status(&self) -> BackendResult<SignalStatus> {
        self.enter("update_signal_status").await?;
        Ok(self.state.lock().signal.clone())
    }

    async fn start_channel_scan(&self) -> BackendResult<()> {
        self.enter("start_channel_scan").await
    }

    fn menu_hooks(&self) -> Vec<MenuHook> {
        self.state.lock().menu_hooks.clone()
    }

    async fn call_menu_hook(&self, hook: &MenuHook) -> BackendResult<()> {
        self.enter("call_menu_hook").await?;
        if self.state.lock().menu_hooks.iter().any(|h| h.hook_id == hook.hook_id) {
            Ok(())
        } else {
            Err(BackendError::InvalidParameters)
        }
    }
}

impl MockBackend {
    fn with_recording(&self, recording: &Recording, apply: impl FnOnce(&mut Recording)) -> BackendResult<()> {
        let mut state = self.state.lock();
        let existing = state
            .recordings
            .iter_mut()
            .find(|r| r.recording_id == recording.recording_id)
            .ok_or(BackendError::InvalidParameters)?;
        apply(existing);
        Ok(())
    }
}
