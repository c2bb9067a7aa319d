//! Events published by the registry.
//!
//! Subscribers receive them through [`Registry::subscribe`](super::Registry::subscribe).
//! Publishing never blocks; a lagging subscriber misses events rather than
//! slowing the registry down.

use std::fmt;

use pvr_core::{AddonId, ClientId};

use crate::stream::StreamKind;

/// Change in the set of clients or in the stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A module was registered under a client identity.
    Registered {
        client_id: ClientId,
        addon_id: AddonId,
    },

    /// A registered client came online.
    Connected { client_id: ClientId },

    /// A client went offline but stays registered.
    Disconnected { client_id: ClientId },

    /// A client was removed from the registry.
    Removed {
        client_id: ClientId,
        reason: RemovalReason,
    },

    /// A stream was opened on a client.
    StreamOpened {
        client_id: ClientId,
        kind: StreamKind,
    },

    /// The stream session returned to idle.
    StreamClosed { client_id: ClientId },
}

/// Reason why a client was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Removed on request.
    Explicit,

    /// The module is no longer installed.
    Uninstalled,

    /// The module was disabled in the addon source.
    Disabled,

    /// The module's code could not be loaded.
    LoadFailed,

    /// The engine is shutting down.
    Shutdown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicitly removed"),
            Self::Uninstalled => write!(f, "add-on uninstalled"),
            Self::Disabled => write!(f, "add-on disabled"),
            Self::LoadFailed => write!(f, "add-on failed to load"),
            Self::Shutdown => write!(f, "shutting down"),
        }
    }
}
