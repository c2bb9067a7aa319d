//! Handle wrapping one backend module.
//!
//! A `ClientHandle` is created when a module is registered and lives in the
//! registry map behind an `Arc`. Callers get short-lived clones of that
//! `Arc`; removing the entry from the map never invalidates a clone that
//! is still in use.
//!
//! Data operations check the capability set cached at registration before
//! calling into the module, and answer `NotImplemented` for features the
//! client does not advertise.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use pvr_addon::{AddonDescriptor, PvrBackend};
use pvr_core::{
    AddonId, BackendError, BackendResult, Capabilities, Channel, ChannelGroup, ClientId,
    ConnectError, EpgEntry, GroupMember, Recording, Timer,
};

/// A registered backend client.
pub struct ClientHandle {
    id: ClientId,
    addon_id: AddonId,
    addon_name: String,
    backend: Arc<dyn PvrBackend>,
    capabilities: Capabilities,
    connected: AtomicBool,
}

impl ClientHandle {
    /// Wraps a module. Reads its capabilities once.
    pub fn new(id: ClientId, descriptor: &AddonDescriptor) -> Self {
        Self {
            id,
            addon_id: descriptor.id.clone(),
            addon_name: descriptor.name.clone(),
            capabilities: descriptor.backend.capabilities(),
            backend: Arc::clone(&descriptor.backend),
            connected: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn addon_id(&self) -> &AddonId {
        &self.addon_id
    }

    pub fn addon_name(&self) -> &str {
        &self.addon_name
    }

    pub fn backend(&self) -> &Arc<dyn PvrBackend> {
        &self.backend
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Name of the backend this client talks to.
    pub fn friendly_name(&self) -> String {
        self.backend.friendly_name()
    }

    /// Returns true if the module was created and still has its backend.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.backend.is_ready()
    }

    /// Returns true if `create` succeeded and the module was not destroyed
    /// since. Does not ask the backend.
    pub(crate) fn is_created(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Returns true if the module belongs to the same installed add-on.
    pub fn is_same_addon(&self, descriptor: &AddonDescriptor) -> bool {
        self.addon_id == descriptor.id
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Brings the module online. A connected module is destroyed and
    /// created again.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        if self.connected.swap(false, Ordering::AcqRel) {
            debug!(client_id = %self.id, "Re-creating connected client");
            self.backend.destroy().await;
        }

        self.backend.create(self.id).await?;
        self.connected.store(true, Ordering::Release);
        info!(
            client_id = %self.id,
            addon = %self.addon_id,
            name = %self.friendly_name(),
            capabilities = %self.capabilities,
            "Client connected"
        );
        Ok(())
    }

    /// Takes the module offline. Does nothing if it was not connected.
    ///
    /// Returns true if the module was destroyed.
    pub async fn disconnect(&self) -> bool {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.backend.destroy().await;
        debug!(client_id = %self.id, addon = %self.addon_id, "Client disconnected");
        true
    }

    // ------------------------------------------------------------------------
    // Capability-checked data operations
    // ------------------------------------------------------------------------

    fn require(&self, supported: bool) -> BackendResult<()> {
        if supported {
            Ok(())
        } else {
            Err(BackendError::NotImplemented)
        }
    }

    pub async fn get_channels(&self, radio: bool) -> BackendResult<Vec<Channel>> {
        self.require(if radio { self.capabilities.radio } else { self.capabilities.tv })?;
        self.backend.get_channels(radio).await
    }

    pub async fn get_channel_groups(&self, radio: bool) -> BackendResult<Vec<ChannelGroup>> {
        self.require(self.capabilities.channel_groups)?;
        self.backend.get_channel_groups(radio).await
    }

    pub async fn get_channel_group_members(
        &self,
        group: &ChannelGroup,
    ) -> BackendResult<Vec<GroupMember>> {
        self.require(self.capabilities.channel_groups)?;
        self.backend.get_channel_group_members(group).await
    }

    pub async fn get_epg_for_channel(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BackendResult<Vec<EpgEntry>> {
        self.require(self.capabilities.epg)?;
        self.backend.get_epg_for_channel(channel, start, end).await
    }

    pub async fn get_timers(&self) -> BackendResult<Vec<Timer>> {
        self.require(self.capabilities.timers)?;
        self.backend.get_timers().await
    }

    pub async fn add_timer(&self, timer: &Timer) -> BackendResult<()> {
        self.require(self.capabilities.timers)?;
        self.backend.add_timer(timer).await
    }

    pub async fn update_timer(&self, timer: &Timer) -> BackendResult<()> {
        self.require(self.capabilities.timers)?;
        self.backend.update_timer(timer).await
    }

    pub async fn delete_timer(&self, timer: &Timer, force: bool) -> BackendResult<()> {
        self.require(self.capabilities.timers)?;
        self.backend.delete_timer(timer, force).await
    }

    pub async fn rename_timer(&self, timer: &Timer, new_name: &str) -> BackendResult<()> {
        self.require(self.capabilities.timers)?;
        self.backend.rename_timer(timer, new_name).await
    }

    pub async fn get_recordings(&self) -> BackendResult<Vec<Recording>> {
        self.require(self.capabilities.recordings)?;
        self.backend.get_recordings().await
    }

    pub async fn rename_recording(&self, recording: &Recording) -> BackendResult<()> {
        self.require(self.capabilities.recordings)?;
        self.backend.rename_recording(recording).await
    }

    pub async fn delete_recording(&self, recording: &Recording) -> BackendResult<()> {
        self.require(self.capabilities.recordings)?;
        self.backend.delete_recording(recording).await
    }

    pub async fn start_channel_scan(&self) -> BackendResult<()> {
        self.require(self.capabilities.channel_scan)?;
        self.backend.start_channel_scan().await
    }

    /// Serializable snapshot for display.
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            addon_id: self.addon_id.clone(),
            addon_name: self.addon_name.clone(),
            friendly_name: self.friendly_name(),
            connected: self.is_connected(),
            capabilities: self.capabilities,
        }
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("addon_id", &self.addon_id)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Point-in-time description of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub addon_id: AddonId,
    pub addon_name: String,
    pub friendly_name: String,
    pub connected: bool,
    pub capabilities: Capabilities,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvr_addon::testing::MockBackend;

    fn handle_for(mock: Arc<MockBackend>) -> ClientHandle {
        let descriptor = AddonDescriptor::new("pvr.mock", "Mock", mock);
        ClientHandle::new(ClientId::new(7), &descriptor)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let mock = Arc::new(MockBackend::new("mock backend"));
        let handle = handle_for(Arc::clone(&mock));
        assert!(!handle.is_connected());

        handle.connect().await.unwrap();
        assert!(handle.is_connected());
        assert_eq!(mock.client_id(), Some(ClientId::new(7)));

        assert!(handle.disconnect().await);
        assert!(!handle.is_connected());
        assert!(!handle.disconnect().await);
        assert_eq!(mock.call_count("destroy"), 1);
    }

    #[tokio::test]
    async fn test_reconnect_destroys_first() {
        let mock = Arc::new(MockBackend::new("mock"));
        let handle = handle_for(Arc::clone(&mock));
        handle.connect().await.unwrap();
        handle.connect().await.unwrap();
        assert_eq!(mock.calls(), vec!["create", "destroy", "create"]);
    }

    #[tokio::test]
    async fn test_failed_connect_stays_offline() {
        let mock = Arc::new(MockBackend::new("mock"));
        mock.fail_connect(ConnectError::Offline("unreachable".into()));
        let handle = handle_for(Arc::clone(&mock));

        assert!(handle.connect().await.is_err());
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_not_ready_backend_is_not_connected() {
        let mock = Arc::new(MockBackend::new("mock"));
        let handle = handle_for(Arc::clone(&mock));
        handle.connect().await.unwrap();

        mock.set_ready(false);
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_missing_capability_short_circuits() {
        let mock = Arc::new(MockBackend::new("mock").with_capabilities(Capabilities::live_tv()));
        let handle = handle_for(Arc::clone(&mock));
        handle.connect().await.unwrap();

        assert_eq!(handle.get_timers().await, Err(BackendError::NotImplemented));
        assert_eq!(handle.get_channels(true).await, Err(BackendError::NotImplemented));
        assert_eq!(mock.call_count("get_timers"), 0);
        assert!(handle.get_channels(false).await.is_ok());
    }

    #[test]
    fn test_info_snapshot() {
        let handle = handle_for(Arc::new(MockBackend::new("tvheadend@host")));
        let info = handle.info();
        assert_eq!(info.id, ClientId::new(7));
        assert_eq!(info.addon_id, AddonId::new("pvr.mock"));
        assert_eq!(info.friendly_name, "tvheadend@host");
        assert!(!info.connected);
    }
}
