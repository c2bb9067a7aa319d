//! Client registry: the identity → client handle map and the shared
//! session state.
//!
//! Every mutable piece of engine state lives in one [`RegistryState`]
//! behind one `parking_lot::Mutex`. The lock is only ever held for map or
//! flag updates; every call into a backend module happens after the guard
//! has been dropped, so a slow or hung backend never blocks lookups.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  register/remove  ┌──────────────────────────────┐
//! │   Supervisor    │──────────────────▶│          Registry            │
//! └─────────────────┘                   │  Mutex<RegistryState>        │
//! ┌─────────────────┐  lookup/snapshot  │   clients: id → Arc<Handle>  │
//! │ DataService     │──────────────────▶│   session / switching / ...  │
//! │ StreamManager   │                   └──────────────┬───────────────┘
//! └─────────────────┘                                  │ ClientEvent
//!                                                      ▼
//!                                          broadcast::Sender (subscribers)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Event publishing ignores the "no subscribers" case
//! - A poisoned lock cannot happen (`parking_lot` locks do not poison)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use pvr_addon::{AddonDescriptor, IdentityStore};
use pvr_core::{AddonId, Capabilities, ClientId, PvrError, PvrResult, SignalStatus};

use crate::stream::StreamSession;

mod events;
mod handle;

pub use events::{ClientEvent, RemovalReason};
pub use handle::{ClientHandle, ClientInfo};

/// Event channel buffer size.
const EVENT_BUFFER: usize = 100;

/// Ordered snapshot of connected clients.
pub type ClientSnapshot = BTreeMap<ClientId, Arc<ClientHandle>>;

// ============================================================================
// Registry State
// ============================================================================

/// State guarded by the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    /// Registered clients
    clients: HashMap<ClientId, Arc<ClientHandle>>,

    /// Modules seen by the last supervisor pass
    known_addons: Vec<AddonId>,

    /// The open stream, `None` when idle
    session: Option<StreamSession>,

    /// Last signal status reported for the open stream
    signal: Option<SignalStatus>,

    /// A channel switch is in progress
    switching: bool,

    /// A channel scan is in progress
    scanning: bool,

    /// The playing channel's settings were loaded since it was opened
    settings_valid: bool,

    /// The "no clients enabled" notification was shown this run
    no_clients_notified: bool,
}

// ============================================================================
// Registry
// ============================================================================

/// Identity → client map plus the engine's session state.
pub struct Registry {
    state: Mutex<RegistryState>,
    identities: Arc<dyn IdentityStore>,
    events: broadcast::Sender<ClientEvent>,
}

impl Registry {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Mutex::new(RegistryState::default()),
            identities,
            events,
        }
    }

    /// Subscribes to client and session events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ClientEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a module and returns its client identity.
    ///
    /// Registering a module that is already registered returns its existing
    /// identity without creating a second handle.
    ///
    /// # Errors
    ///
    /// `PvrError::RegistrationFailed` if the descriptor is disabled, the
    /// identity store fails or returns an unusable identity, or the identity
    /// is already held by a different module.
    pub fn register(&self, descriptor: &AddonDescriptor) -> PvrResult<ClientId> {
        let failed = |reason: String| PvrError::RegistrationFailed {
            addon: descriptor.id.clone(),
            reason,
        };

        if !descriptor.enabled {
            return Err(failed("add-on is disabled".to_string()));
        }

        let client_id = self
            .identities
            .resolve_or_create(&descriptor.id)
            .map_err(|e| failed(e.to_string()))?;

        if !client_id.is_valid() {
            return Err(failed(format!("identity store returned invalid id {client_id}")));
        }

        // Resolves capabilities, so it is built before the lock is taken.
        let handle = Arc::new(ClientHandle::new(client_id, descriptor));

        {
            let mut state = self.state.lock();
            if let Some(existing) = state.clients.get(&client_id) {
                if existing.is_same_addon(descriptor) {
                    return Ok(client_id);
                }
                warn!(
                    client_id = %client_id,
                    addon = %descriptor.id,
                    holder = %existing.addon_id(),
                    "Client identity already held by another add-on"
                );
                return Err(failed(format!(
                    "client id {client_id} is held by {}",
                    existing.addon_id()
                )));
            }

            state.clients.insert(client_id, handle);
        }

        info!(client_id = %client_id, addon = %descriptor.id, "Client registered");
        self.publish(ClientEvent::Registered {
            client_id,
            addon_id: descriptor.id.clone(),
        });
        Ok(client_id)
    }

    /// Brings a registered client online.
    ///
    /// A connected client is re-created. If it owned the stream session,
    /// the session is reset to idle first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the client is not registered, `ConnectionFailed` if
    /// the module failed to come online.
    pub async fn connect(&self, id: ClientId) -> PvrResult<()> {
        let handle = self.lookup(id)?;
        if handle.is_created() {
            // The module is destroyed and created again, losing any open stream.
            self.reset_session_owned_by(id);
        }
        handle
            .connect()
            .await
            .map_err(|source| PvrError::ConnectionFailed {
                addon: handle.addon_id().clone(),
                source,
            })?;
        self.publish(ClientEvent::Connected { client_id: id });
        Ok(())
    }

    /// Takes a client offline while keeping it registered.
    ///
    /// If it owned the stream session, the session is reset to idle.
    ///
    /// # Errors
    ///
    /// `NotFound` if the client is not registered.
    pub async fn disconnect(&self, id: ClientId) -> PvrResult<()> {
        let handle = self.lookup(id)?;
        self.reset_session_owned_by(id);
        if handle.disconnect().await {
            self.publish(ClientEvent::Disconnected { client_id: id });
        }
        Ok(())
    }

    /// Removes a client and tears its module down.
    ///
    /// The entry is erased under the lock; the module is destroyed after
    /// the lock is released. If the removed client owned the stream session,
    /// the session is reset to idle.
    ///
    /// # Errors
    ///
    /// `NotFound` if the client is not registered.
    pub async fn remove(&self, id: ClientId, reason: RemovalReason) -> PvrResult<()> {
        let handle = self
            .state
            .lock()
            .clients
            .remove(&id)
            .ok_or(PvrError::NotFound(id))?;

        self.reset_session_owned_by(id);
        handle.disconnect().await;

        info!(
            client_id = %id,
            addon = %handle.addon_id(),
            reason = %reason,
            "Client removed"
        );
        self.publish(ClientEvent::Removed {
            client_id: id,
            reason,
        });
        Ok(())
    }

    /// Removes every client, tearing each module down outside the lock.
    pub(crate) async fn clear(&self) {
        let handles: Vec<Arc<ClientHandle>> = {
            let mut state = self.state.lock();
            state.session = None;
            state.signal = None;
            state.settings_valid = false;
            state.known_addons.clear();
            state.clients.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            handle.disconnect().await;
            self.publish(ClientEvent::Removed {
                client_id: handle.id(),
                reason: RemovalReason::Shutdown,
            });
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Returns the client registered under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is not a valid identity or nothing is registered
    /// under it.
    pub fn lookup(&self, id: ClientId) -> PvrResult<Arc<ClientHandle>> {
        if !id.is_valid() {
            return Err(PvrError::NotFound(id));
        }
        self.state
            .lock()
            .clients
            .get(&id)
            .cloned()
            .ok_or(PvrError::NotFound(id))
    }

    /// Returns the client registered under `id` if it is connected.
    ///
    /// # Errors
    ///
    /// `NotFound` as for [`Registry::lookup`]; `ClientUnavailable` if the
    /// client is registered but offline.
    pub fn lookup_connected(&self, id: ClientId) -> PvrResult<Arc<ClientHandle>> {
        let handle = self.lookup(id)?;
        if handle.is_connected() {
            Ok(handle)
        } else {
            Err(PvrError::ClientUnavailable(id))
        }
    }

    /// Point-in-time copy of the connected clients, ordered by identity.
    pub fn connected_snapshot(&self) -> ClientSnapshot {
        self.registered_handles()
            .into_iter()
            .filter(|handle| handle.is_connected())
            .map(|handle| (handle.id(), handle))
            .collect()
    }

    /// Clones every handle under the lock. Readiness checks call into the
    /// module and happen on the copy.
    fn registered_handles(&self) -> Vec<Arc<ClientHandle>> {
        self.state.lock().clients.values().cloned().collect()
    }

    /// Every registered client, ordered by identity.
    pub fn all_clients(&self) -> Vec<Arc<ClientHandle>> {
        let mut clients = self.registered_handles();
        clients.sort_by_key(|handle| handle.id());
        clients
    }

    /// Identity of the client registered for `addon`, if any.
    pub fn client_id_for_addon(&self, addon: &AddonId) -> Option<ClientId> {
        self.state
            .lock()
            .clients
            .values()
            .find(|handle| handle.addon_id() == addon)
            .map(|handle| handle.id())
    }

    /// Returns true if `addon` is registered.
    pub fn is_known_addon(&self, addon: &AddonId) -> bool {
        self.client_id_for_addon(addon).is_some()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().clients.is_empty()
    }

    /// Number of enabled clients. Disabled modules are removed from the
    /// registry, so this counts every registered client.
    pub fn enabled_client_count(&self) -> usize {
        self.len()
    }

    pub fn connected_client_count(&self) -> usize {
        self.registered_handles()
            .iter()
            .filter(|handle| handle.is_connected())
            .count()
    }

    pub fn has_connected_clients(&self) -> bool {
        self.registered_handles()
            .iter()
            .any(|handle| handle.is_connected())
    }

    /// Capability set of a connected client.
    pub fn capabilities(&self, id: ClientId) -> PvrResult<Capabilities> {
        Ok(self.lookup_connected(id)?.capabilities())
    }

    /// Display name of a connected client.
    pub fn friendly_name(&self, id: ClientId) -> PvrResult<String> {
        Ok(self.lookup_connected(id)?.friendly_name())
    }

    /// Lowest identity among connected clients.
    pub fn first_connected_client_id(&self) -> Option<ClientId> {
        self.connected_snapshot().keys().next().copied()
    }

    // ========================================================================
    // Supervisor bookkeeping
    // ========================================================================

    pub(crate) fn known_addons(&self) -> Vec<AddonId> {
        self.state.lock().known_addons.clone()
    }

    pub(crate) fn set_known_addons(&self, addons: Vec<AddonId>) {
        self.state.lock().known_addons = addons;
    }

    /// Returns true the first time it is called in a run.
    pub(crate) fn latch_no_clients_warning(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.no_clients_notified, true)
    }

    // ========================================================================
    // Session state
    // ========================================================================

    pub(crate) fn session(&self) -> Option<StreamSession> {
        self.state.lock().session.clone()
    }

    /// Identity of the playing client, if a stream is open.
    pub fn playing_client_id(&self) -> Option<ClientId> {
        self.state.lock().session.as_ref().map(|s| s.client_id)
    }

    pub(crate) fn open_session(&self, session: StreamSession) {
        let client_id = session.client_id;
        let kind = session.kind();
        {
            let mut state = self.state.lock();
            state.session = Some(session);
            state.signal = None;
            state.settings_valid = false;
        }
        self.publish(ClientEvent::StreamOpened { client_id, kind });
    }

    /// Replaces the playing channel after an in-place switch.
    pub(crate) fn update_session(&self, session: StreamSession) {
        let mut state = self.state.lock();
        state.session = Some(session);
        state.signal = None;
    }

    /// Resets the session to idle. Returns the session that was open.
    pub(crate) fn close_session(&self) -> Option<StreamSession> {
        let closed = {
            let mut state = self.state.lock();
            state.signal = None;
            state.settings_valid = false;
            state.session.take()
        };
        if let Some(session) = &closed {
            self.publish(ClientEvent::StreamClosed {
                client_id: session.client_id,
            });
        }
        closed
    }

    fn reset_session_owned_by(&self, id: ClientId) {
        let owned = self.state.lock().session.as_ref().map(|s| s.client_id) == Some(id);
        if owned {
            debug!(client_id = %id, "Resetting stream session of departing client");
            self.close_session();
        }
    }

    pub(crate) fn signal(&self) -> Option<SignalStatus> {
        self.state.lock().signal.clone()
    }

    pub(crate) fn set_signal(&self, client_id: ClientId, signal: SignalStatus) {
        let mut state = self.state.lock();
        if state.session.as_ref().map(|s| s.client_id) == Some(client_id) {
            state.signal = Some(signal);
        }
    }

    /// Sets the switching flag. Returns false if it was already set.
    pub(crate) fn begin_switch(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.switching, true)
    }

    pub(crate) fn end_switch(&self) {
        self.state.lock().switching = false;
    }

    pub fn is_switching(&self) -> bool {
        self.state.lock().switching
    }

    pub(crate) fn set_scanning(&self, scanning: bool) {
        self.state.lock().scanning = scanning;
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock().scanning
    }

    pub(crate) fn settings_valid(&self) -> bool {
        self.state.lock().settings_valid
    }

    pub(crate) fn set_settings_valid(&self, valid: bool) {
        self.state.lock().settings_valid = valid;
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
