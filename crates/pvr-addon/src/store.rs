//! Persistent stores consumed by the registry.

use pvr_core::{AddonId, Channel, ClientId, StoreError, VideoSettings};

/// Maps module identifiers to stable client identities.
pub trait IdentityStore: Send + Sync {
    /// Returns the identity previously assigned to `addon`, or allocates and
    /// persists a new one. Identities are always greater than zero.
    fn resolve_or_create(&self, addon: &AddonId) -> Result<ClientId, StoreError>;
}

/// Per-channel playback settings storage.
pub trait SettingsStore: Send + Sync {
    /// Loads the settings saved for `channel`, if any.
    fn load(&self, channel: &Channel) -> Result<Option<VideoSettings>, StoreError>;

    fn save(&self, channel: &Channel, settings: &VideoSettings) -> Result<(), StoreError>;

    fn delete(&self, channel: &Channel) -> Result<(), StoreError>;
}
