//! Lifecycle supervisor - keeps the registry in step with the installed
//! backend modules.
//!
//! Every poll the supervisor re-enumerates the addon source and:
//! - removes clients whose module vanished or was disabled
//! - registers and connects enabled modules that are new or offline
//! - disables modules that cannot be registered or loaded
//! - warns once per run when no module is enabled at all
//! - refreshes the signal status of the playing client
//!
//! A pass holds the supervisor gate. Channel scans take the same gate, which
//! suspends polling until the scan is over.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A failing module is logged, counted and skipped; it never stops a pass
//! - Supervisor failures are never returned to callers

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pvr_addon::{AddonDescriptor, AddonSource, NotificationKind, NotificationSink};
use pvr_core::{AddonId, ClientId, PvrError};

use crate::config::ClientsConfig;
use crate::registry::{Registry, RemovalReason};
use crate::stream::StreamKind;

// ============================================================================
// Pass Result
// ============================================================================

/// Counts from one supervisor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorPass {
    /// Modules newly registered
    pub registered: u32,
    /// Clients brought online
    pub connected: u32,
    /// Modules disabled because they failed
    pub disabled: u32,
    /// Clients removed (uninstalled, disabled, or failed to load)
    pub removed: u32,
    /// Registration or connection failures, transient ones included
    pub failed: u32,
}

impl SupervisorPass {
    /// Returns true if the pass changed anything or hit a failure.
    pub fn is_eventful(&self) -> bool {
        *self != Self::default()
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Background task that registers, connects and removes clients.
pub struct Supervisor {
    registry: Arc<Registry>,
    source: Arc<dyn AddonSource>,
    notifier: Arc<dyn NotificationSink>,
    config: ClientsConfig,
    gate: Arc<AsyncMutex<()>>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn AddonSource>,
        notifier: Arc<dyn NotificationSink>,
        config: ClientsConfig,
    ) -> Self {
        Self {
            registry,
            source,
            notifier,
            config,
            gate: Arc::new(AsyncMutex::new(())),
        }
    }

    /// The gate held by every pass. Holding it suspends the supervisor.
    pub fn gate(&self) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.gate)
    }

    /// Spawns the polling task. The first pass runs immediately.
    pub fn spawn(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.config.poll_interval());
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                poll_interval_ms = self.config.poll_interval_ms,
                "Client supervisor started"
            );

            loop {
                tokio::select! {
                    biased;

                    _ = cancel_token.cancelled() => {
                        info!("Client supervisor shutting down");
                        break;
                    }

                    _ = tick.tick() => {
                        let pass = self.run_once(false).await;
                        if pass.is_eventful() {
                            info!(
                                registered = pass.registered,
                                connected = pass.connected,
                                disabled = pass.disabled,
                                removed = pass.removed,
                                failed = pass.failed,
                                "Client update complete"
                            );
                        }
                    }
                }
            }

            debug!("Client supervisor task completed");
        })
    }

    /// Runs one pass. With `force_all`, every enabled module is
    /// (re)connected, even if it is already online.
    pub async fn run_once(&self, force_all: bool) -> SupervisorPass {
        let _gate = self.gate.lock().await;
        let mut pass = SupervisorPass::default();

        let addons = self.source.enumerate();
        self.forget_vanished(&addons, &mut pass).await;

        for addon in &addons {
            if !addon.enabled || self.source.is_disabled(&addon.id) {
                self.remove_addon(&addon.id, RemovalReason::Disabled, &mut pass)
                    .await;
                continue;
            }
            self.initialise(addon, force_all, &mut pass).await;
        }

        self.warn_if_no_clients();
        self.refresh_signal_status().await;

        pass
    }

    /// Removes clients whose module is no longer installed and records the
    /// current module list.
    async fn forget_vanished(&self, addons: &[AddonDescriptor], pass: &mut SupervisorPass) {
        let current: HashSet<&AddonId> = addons.iter().map(|a| &a.id).collect();

        for id in self.registry.known_addons() {
            if !current.contains(&id) {
                debug!(addon = %id, "Add-on no longer installed");
                self.remove_addon(&id, RemovalReason::Uninstalled, pass).await;
            }
        }

        self.registry
            .set_known_addons(addons.iter().map(|a| a.id.clone()).collect());
    }

    async fn remove_addon(&self, addon: &AddonId, reason: RemovalReason, pass: &mut SupervisorPass) {
        let Some(client_id) = self.registry.client_id_for_addon(addon) else {
            return;
        };
        match self.registry.remove(client_id, reason).await {
            Ok(()) => pass.removed += 1,
            Err(e) => debug!(addon = %addon, error = %e, "Client already gone"),
        }
    }

    async fn initialise(&self, addon: &AddonDescriptor, force_all: bool, pass: &mut SupervisorPass) {
        let existing = self.registry.client_id_for_addon(&addon.id);
        let online = existing
            .and_then(|id| self.registry.lookup(id).ok())
            .is_some_and(|client| client.is_connected());

        if online && !force_all {
            return;
        }

        let client_id = match existing {
            Some(id) => id,
            None => match self.registry.register(addon) {
                Ok(id) => {
                    pass.registered += 1;
                    id
                }
                Err(e) => {
                    warn!(addon = %addon.id, error = %e, "Failed to register add-on, disabling it");
                    pass.failed += 1;
                    self.disable(addon, &e.to_string(), pass);
                    return;
                }
            },
        };

        match self.registry.connect(client_id).await {
            Ok(()) => pass.connected += 1,
            Err(PvrError::ConnectionFailed { source, .. }) if source.is_fatal() => {
                warn!(
                    client_id = %client_id,
                    addon = %addon.id,
                    error = %source,
                    "Add-on failed to load, disabling it"
                );
                pass.failed += 1;
                self.disable(addon, &source.to_string(), pass);
                self.remove_client(client_id, pass).await;
            }
            Err(e) => {
                warn!(
                    client_id = %client_id,
                    addon = %addon.id,
                    error = %e,
                    "Client not connected, retrying next poll"
                );
                pass.failed += 1;
            }
        }
    }

    async fn remove_client(&self, client_id: ClientId, pass: &mut SupervisorPass) {
        if self
            .registry
            .remove(client_id, RemovalReason::LoadFailed)
            .await
            .is_ok()
        {
            pass.removed += 1;
        }
    }

    fn disable(&self, addon: &AddonDescriptor, reason: &str, pass: &mut SupervisorPass) {
        self.source.disable(&addon.id, true);
        self.notifier.notify(
            NotificationKind::ClientDisabled,
            &format!("{} was disabled: {reason}", addon.name),
        );
        pass.disabled += 1;
    }

    fn warn_if_no_clients(&self) {
        if !self.config.notify_when_no_clients || self.registry.enabled_client_count() > 0 {
            return;
        }
        if self.registry.latch_no_clients_warning() {
            warn!("No PVR clients are enabled");
            self.notifier.notify(
                NotificationKind::NoClientsEnabled,
                "No PVR clients are enabled. Enable a backend add-on to use live TV.",
            );
        }
    }

    async fn refresh_signal_status(&self) {
        if !self.config.refresh_signal_status {
            return;
        }
        let Some(session) = self.registry.session() else {
            return;
        };
        if session.kind() != StreamKind::LiveTv {
            return;
        }
        let Ok(client) = self.registry.lookup_connected(session.client_id) else {
            return;
        };

        match client.backend().update_signal_status().await {
            Ok(signal) => self.registry.set_signal(client.id(), signal),
            Err(e) => debug!(client_id = %client.id(), error = %e, "Signal status not refreshed"),
        }
    }
}
