//! PVR Addon - Backend module API and collaborator interfaces
//!
//! A backend module implements [`PvrBackend`]. The client registry discovers
//! modules through an [`AddonSource`], assigns them stable identities through
//! an [`IdentityStore`], keeps per-channel playback settings in a
//! [`SettingsStore`], and reports user-facing problems to a
//! [`NotificationSink`].
//!
//! ```text
//! ┌──────────────┐  enumerate   ┌──────────────┐  create/destroy  ┌─────────────┐
//! │ AddonSource  │─────────────▶│   pvrd       │─────────────────▶│ PvrBackend  │
//! └──────────────┘              │   registry   │  data / stream   │  (module)   │
//! ┌──────────────┐  identities  │              │─────────────────▶│             │
//! │IdentityStore │◀─────────────│              │                  └─────────────┘
//! └──────────────┘              └──────────────┘
//! ```
//!
//! The `memory` module has in-process implementations of every collaborator;
//! `static_backend` serves a channel lineup from configuration.

pub mod backend;
pub mod memory;
pub mod notify;
pub mod source;
pub mod static_backend;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::PvrBackend;
pub use memory::{CollectingNotifier, MemoryAddonSource, MemoryIdentityStore, MemorySettingsStore};
pub use notify::{LogNotifier, NotificationKind, NotificationSink};
pub use source::{AddonDescriptor, AddonSource};
pub use static_backend::{
    StaticBackend, StaticBackendConfig, StaticChannel, StaticGroup, StaticRecording,
};
pub use store::{IdentityStore, SettingsStore};
