//! In-memory implementations of the collaborator interfaces.
//!
//! Used by the `pvrd` binary (which has no add-on database) and by tests.
//! Nothing here survives a restart.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use pvr_core::{AddonId, Channel, ClientId, StoreError, VideoSettings};

use crate::{
    AddonDescriptor, AddonSource, IdentityStore, NotificationKind, NotificationSink,
    SettingsStore,
};

// ============================================================================
// Addon Source
// ============================================================================

/// Addon source backed by a mutable list of descriptors.
#[derive(Default)]
pub struct MemoryAddonSource {
    addons: Mutex<Vec<AddonDescriptor>>,
    /// Disabled module ids, with whether the choice was persisted
    disabled: Mutex<HashMap<AddonId, bool>>,
}

impl MemoryAddonSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addons(addons: Vec<AddonDescriptor>) -> Self {
        Self {
            addons: Mutex::new(addons),
            disabled: Mutex::new(HashMap::new()),
        }
    }

    /// Installs a module, replacing any module with the same id.
    pub fn install(&self, addon: AddonDescriptor) {
        let mut addons = self.addons.lock();
        addons.retain(|a| a.id != addon.id);
        addons.push(addon);
    }

    /// Uninstalls a module.
    pub fn uninstall(&self, id: &AddonId) {
        self.addons.lock().retain(|a| &a.id != id);
    }

    /// Clears the administrative disable flag of a module.
    pub fn enable(&self, id: &AddonId) {
        self.disabled.lock().remove(id);
    }

    /// Returns the ids of disabled modules, sorted.
    pub fn disabled_ids(&self) -> Vec<AddonId> {
        let mut ids: Vec<AddonId> = self.disabled.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl AddonSource for MemoryAddonSource {
    fn enumerate(&self) -> Vec<AddonDescriptor> {
        self.addons.lock().clone()
    }

    fn is_disabled(&self, id: &AddonId) -> bool {
        self.disabled.lock().contains_key(id)
    }

    fn disable(&self, id: &AddonId, persist: bool) {
        debug!(addon = %id, persist, "Disabling add-on");
        self.disabled.lock().insert(id.clone(), persist);
    }
}

// ============================================================================
// Identity Store
// ============================================================================

#[derive(Debug)]
struct Identities {
    by_addon: HashMap<AddonId, ClientId>,
    next: i32,
    denied: HashSet<AddonId>,
}

/// Identity store that hands out sequential identities starting at 1.
#[derive(Debug)]
pub struct MemoryIdentityStore {
    inner: Mutex<Identities>,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Identities {
                by_addon: HashMap::new(),
                next: 1,
                denied: HashSet::new(),
            }),
        }
    }
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the store reject `addon`, as a full or read-only database would.
    pub fn deny(&self, addon: impl Into<AddonId>) {
        self.inner.lock().denied.insert(addon.into());
    }

    /// Returns the identity assigned to `addon`, if any.
    pub fn get(&self, addon: &AddonId) -> Option<ClientId> {
        self.inner.lock().by_addon.get(addon).copied()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn resolve_or_create(&self, addon: &AddonId) -> Result<ClientId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.denied.contains(addon) {
            return Err(StoreError::Rejected(addon.to_string()));
        }
        if let Some(id) = inner.by_addon.get(addon) {
            return Ok(*id);
        }

        let id = ClientId::new(inner.next);
        inner.next = inner.next.saturating_add(1);
        inner.by_addon.insert(addon.clone(), id);
        debug!(addon = %addon, client_id = %id, "Allocated client identity");
        Ok(id)
    }
}

// ============================================================================
// Settings Store
// ============================================================================

type ChannelKey = (ClientId, u32, bool);

fn channel_key(channel: &Channel) -> ChannelKey {
    (channel.client_id, channel.unique_id, channel.is_radio)
}

/// Settings store keyed by channel identity.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<HashMap<ChannelKey, VideoSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of channels with saved settings.
    pub fn len(&self) -> usize {
        self.settings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.lock().is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, channel: &Channel) -> Result<Option<VideoSettings>, StoreError> {
        Ok(self.settings.lock().get(&channel_key(channel)).cloned())
    }

    fn save(&self, channel: &Channel, settings: &VideoSettings) -> Result<(), StoreError> {
        self.settings
            .lock()
            .insert(channel_key(channel), settings.clone());
        Ok(())
    }

    fn delete(&self, channel: &Channel) -> Result<(), StoreError> {
        self.settings.lock().remove(&channel_key(channel));
        Ok(())
    }
}

// ============================================================================
// Notification Sink
// ============================================================================

/// Sink that keeps every notification for later inspection.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<(NotificationKind, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification received so far.
    pub fn notifications(&self) -> Vec<(NotificationKind, String)> {
        self.received.lock().clone()
    }

    /// Returns how many notifications of `kind` were received.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.received.lock().iter().filter(|(k, _)| *k == kind).count()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.received.lock().push((kind, message.to_string()));
    }
}
