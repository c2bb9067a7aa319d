//! Channel scans.
//!
//! A scan runs on one client while the lifecycle supervisor is suspended:
//! the scan holds the supervisor gate for its whole duration, so no client
//! is registered, reconnected or removed underneath it.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use pvr_addon::{NotificationKind, NotificationSink};
use pvr_core::{ClientId, PvrError, PvrResult};

use crate::registry::{ClientHandle, Registry};

/// Clears the registry's scanning flag when dropped.
struct ScanFlag<'a> {
    registry: &'a Registry,
}

impl<'a> ScanFlag<'a> {
    fn raise(registry: &'a Registry) -> Self {
        registry.set_scanning(true);
        Self { registry }
    }
}

impl Drop for ScanFlag<'_> {
    fn drop(&mut self) {
        self.registry.set_scanning(false);
    }
}

/// Starts channel scans on scan-capable clients.
pub struct ScanService {
    registry: Arc<Registry>,
    notifier: Arc<dyn NotificationSink>,
    gate: Arc<AsyncMutex<()>>,
}

impl ScanService {
    /// `gate` must be the supervisor's gate.
    pub fn new(
        registry: Arc<Registry>,
        notifier: Arc<dyn NotificationSink>,
        gate: Arc<AsyncMutex<()>>,
    ) -> Self {
        Self {
            registry,
            notifier,
            gate,
        }
    }

    /// Connected clients that can scan for channels, ordered by identity.
    pub fn clients_supporting_channel_scan(&self) -> Vec<Arc<ClientHandle>> {
        self.registry
            .connected_snapshot()
            .into_values()
            .filter(|client| client.capabilities().channel_scan)
            .collect()
    }

    pub fn is_running_channel_scan(&self) -> bool {
        self.registry.is_scanning()
    }

    /// Runs a channel scan.
    ///
    /// With `None`, the only scan-capable client is used.
    ///
    /// # Errors
    ///
    /// - `NoScanClient` if no connected client can scan (also notified)
    /// - `ScanClientRequired` if several can and none was named
    /// - `ClientUnavailable` if the named client cannot scan
    /// - the backend error if the scan fails (also notified)
    pub async fn start_channel_scan(&self, client: Option<ClientId>) -> PvrResult<()> {
        let client = self.scan_client(client)?;

        let _gate = self.gate.lock().await;
        let _flag = ScanFlag::raise(&self.registry);

        info!(client_id = %client.id(), name = %client.friendly_name(), "Channel scan started");
        let started = Instant::now();
        let result = client.start_channel_scan().await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                info!(client_id = %client.id(), elapsed_ms, "Channel scan finished");
                Ok(())
            }
            Err(e) => {
                error!(client_id = %client.id(), elapsed_ms, error = %e, "Channel scan failed");
                self.notifier.notify(
                    NotificationKind::ScanFailed,
                    &format!("Channel scan on {} failed: {e}", client.friendly_name()),
                );
                Err(PvrError::backend(client.id(), "start_channel_scan", e))
            }
        }
    }

    fn scan_client(&self, requested: Option<ClientId>) -> PvrResult<Arc<ClientHandle>> {
        if let Some(id) = requested {
            let client = self.registry.lookup_connected(id)?;
            if !client.capabilities().channel_scan {
                return Err(PvrError::ClientUnavailable(id));
            }
            return Ok(client);
        }

        let mut candidates = self.clients_supporting_channel_scan();
        match candidates.len() {
            0 => {
                warn!("Channel scan requested but no client supports it");
                self.notifier.notify(
                    NotificationKind::NoScanClients,
                    "None of the connected clients supports scanning for channels",
                );
                Err(PvrError::NoScanClient)
            }
            1 => candidates.pop().ok_or(PvrError::NoScanClient),
            n => Err(PvrError::ScanClientRequired { candidates: n }),
        }
    }
}
