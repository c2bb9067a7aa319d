//! Discovery of installed backend modules.

use std::fmt;
use std::sync::Arc;

use pvr_core::AddonId;

use crate::PvrBackend;

/// A backend module published by the addon source.
#[derive(Clone)]
pub struct AddonDescriptor {
    /// Module identifier
    pub id: AddonId,
    /// Display name of the module (not of the backend it connects to)
    pub name: String,
    /// Enabled in the addon manager
    pub enabled: bool,
    /// The loaded module
    pub backend: Arc<dyn PvrBackend>,
}

impl AddonDescriptor {
    pub fn new(id: impl Into<AddonId>, name: impl Into<String>, backend: Arc<dyn PvrBackend>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            backend,
        }
    }

    /// Returns the descriptor marked as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Debug for AddonDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddonDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Source of installed backend modules and their administrative state.
pub trait AddonSource: Send + Sync {
    /// Lists every installed PVR backend module, enabled or not.
    fn enumerate(&self) -> Vec<AddonDescriptor>;

    /// Returns true if the module was administratively disabled.
    fn is_disabled(&self, id: &AddonId) -> bool;

    /// Disables a module. With `persist` the choice survives restarts.
    fn disable(&self, id: &AddonId, persist: bool);
}
