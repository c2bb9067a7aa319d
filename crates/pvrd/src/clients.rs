//! The [`PvrClients`] context object.
//!
//! Owns the registry and the services built on it, and runs the lifecycle
//! supervisor. One `PvrClients` per application, passed around explicitly.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pvr_addon::{AddonSource, IdentityStore, NotificationSink, SettingsStore};
use pvr_core::{AddonId, PvrError, PvrResult};

use crate::config::ClientsConfig;
use crate::data::DataService;
use crate::registry::{ClientEvent, Registry};
use crate::scan::ScanService;
use crate::stream::StreamManager;
use crate::supervisor::{Supervisor, SupervisorPass};

/// External collaborators the engine is built on.
#[derive(Clone)]
pub struct Collaborators {
    pub addons: Arc<dyn AddonSource>,
    pub identities: Arc<dyn IdentityStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Running supervisor task.
struct SupervisorTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry, supervisor, data, stream and scan surfaces in one place.
pub struct PvrClients {
    config: ClientsConfig,
    registry: Arc<Registry>,
    supervisor: Arc<Supervisor>,
    gate: Arc<AsyncMutex<()>>,
    data: DataService,
    stream: StreamManager,
    scan: ScanService,
    task: Mutex<Option<SupervisorTask>>,
}

impl PvrClients {
    pub fn new(config: ClientsConfig, collaborators: Collaborators) -> Self {
        let registry = Arc::new(Registry::new(collaborators.identities));
        let supervisor = Arc::new(Supervisor::new(
            Arc::clone(&registry),
            collaborators.addons,
            Arc::clone(&collaborators.notifier),
            config.clone(),
        ));
        let gate = supervisor.gate();

        Self {
            data: DataService::new(Arc::clone(&registry)),
            stream: StreamManager::new(Arc::clone(&registry), collaborators.settings),
            scan: ScanService::new(
                Arc::clone(&registry),
                collaborators.notifier,
                Arc::clone(&gate),
            ),
            config,
            registry,
            supervisor,
            gate,
            task: Mutex::new(None),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts the supervisor. Does nothing if it is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Supervisor already running");
            return;
        }

        let cancel_token = CancellationToken::new();
        let handle = Arc::clone(&self.supervisor).spawn(cancel_token.clone());
        *task = Some(SupervisorTask {
            cancel_token,
            handle,
        });
        info!("PVR clients started");
    }

    /// Stops the supervisor and waits for its task to finish.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };

        task.cancel_token.cancel();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Supervisor task ended abnormally");
        }
        info!("PVR clients stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Stops the supervisor, closes the stream and tears down every client.
    pub async fn unload(&self) {
        self.stop().await;
        self.stream.close_stream().await;
        self.registry.clear().await;
        info!("PVR clients unloaded");
    }

    /// Runs one supervisor pass now.
    pub async fn update_and_initialise_clients(&self, force_all: bool) -> SupervisorPass {
        self.supervisor.run_once(force_all).await
    }

    /// Disconnects and reconnects the client of `addon`.
    ///
    /// # Errors
    ///
    /// `UnknownAddon` if the module is not registered, or the connection
    /// error.
    pub async fn request_restart(&self, addon: &AddonId) -> PvrResult<()> {
        let client_id = self
            .registry
            .client_id_for_addon(addon)
            .ok_or_else(|| PvrError::UnknownAddon(addon.clone()))?;

        let _gate = self.gate.lock().await;
        info!(client_id = %client_id, addon = %addon, "Restarting client");
        self.registry.connect(client_id).await
    }

    /// Disconnects the client of `addon`. It stays registered and the next
    /// supervisor pass reconnects it unless the module was disabled.
    ///
    /// # Errors
    ///
    /// `UnknownAddon` if the module is not registered.
    pub async fn request_removal(&self, addon: &AddonId) -> PvrResult<()> {
        let client_id = self
            .registry
            .client_id_for_addon(addon)
            .ok_or_else(|| PvrError::UnknownAddon(addon.clone()))?;

        info!(client_id = %client_id, addon = %addon, "Stopping client");
        self.registry.disconnect(client_id).await
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn data(&self) -> &DataService {
        &self.data
    }

    pub fn stream(&self) -> &StreamManager {
        &self.stream
    }

    pub fn scan(&self) -> &ScanService {
        &self.scan
    }

    pub fn config(&self) -> &ClientsConfig {
        &self.config
    }

    /// Subscribes to client and session events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.registry.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pvr_addon::testing::MockBackend;
    use pvr_addon::{
        AddonDescriptor, CollectingNotifier, MemoryAddonSource, MemoryIdentityStore,
        MemorySettingsStore,
    };

    fn clients_with(addons: Vec<AddonDescriptor>) -> PvrClients {
        PvrClients::new(
            ClientsConfig::default().with_poll_interval(Duration::from_millis(10)),
            Collaborators {
                addons: Arc::new(MemoryAddonSource::with_addons(addons)),
                identities: Arc::new(MemoryIdentityStore::new()),
                settings: Arc::new(MemorySettingsStore::new()),
                notifier: Arc::new(CollectingNotifier::new()),
            },
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_joins() {
        let clients = clients_with(Vec::new());
        assert!(!clients.is_running());

        clients.start();
        clients.start();
        assert!(clients.is_running());

        clients.stop().await;
        assert!(!clients.is_running());

        // Stopping twice is harmless
        clients.stop().await;
    }

    #[tokio::test]
    async fn test_request_restart_unknown_addon() {
        let clients = clients_with(Vec::new());
        let result = clients.request_restart(&AddonId::new("pvr.none")).await;
        assert_eq!(result, Err(PvrError::UnknownAddon(AddonId::new("pvr.none"))));
    }

    #[tokio::test]
    async fn test_request_removal_keeps_registration() {
        let mock = Arc::new(MockBackend::new("a"));
        let clients = clients_with(vec![AddonDescriptor::new("pvr.a", "A", mock)]);
        clients.update_and_initialise_clients(false).await;
        assert_eq!(clients.registry().connected_client_count(), 1);

        clients
            .request_removal(&AddonId::new("pvr.a"))
            .await
            .unwrap();
        assert_eq!(clients.registry().len(), 1);
        assert_eq!(clients.registry().connected_client_count(), 0);

        let pass = clients.update_and_initialise_clients(false).await;
        assert_eq!(pass.connected, 1);
        assert_eq!(pass.registered, 0);
    }

    #[tokio::test]
    async fn test_unload_tears_down_clients() {
        let mock = Arc::new(MockBackend::new("a"));
        let clients = clients_with(vec![AddonDescriptor::new("pvr.a", "A", mock.clone())]);
        clients.update_and_initialise_clients(false).await;

        clients.unload().await;
        assert!(clients.registry().is_empty());
        assert_eq!(mock.call_count("destroy"), 1);
    }
}
