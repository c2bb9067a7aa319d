//! Error taxonomy shared by the engine and backend modules.

use thiserror::Error;

use crate::{AddonId, ClientId};

// ============================================================================
// Backend Error Codes
// ============================================================================

/// Result codes returned by a backend module for a single call.
///
/// `NotImplemented` is special: aggregate operations treat it as "no
/// contribution" rather than a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendError {
    #[error("not implemented")]
    NotImplemented,

    #[error("unknown error")]
    Unknown,

    #[error("server error")]
    ServerError,

    #[error("server timeout")]
    ServerTimeout,

    #[error("rejected by backend")]
    RejectedByBackend,

    #[error("already present")]
    AlreadyPresent,

    #[error("invalid parameters")]
    InvalidParameters,

    #[error("recording is running")]
    RecordingRunning,

    #[error("failed")]
    Failed,
}

impl BackendError {
    /// Returns true for the "not supported by this client" code.
    pub fn is_not_implemented(self) -> bool {
        matches!(self, Self::NotImplemented)
    }
}

/// Result type for calls into a backend module.
pub type BackendResult<T> = Result<T, BackendError>;

// ============================================================================
// Connection Errors
// ============================================================================

/// Why a registered module failed to come online.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The module's code could not be loaded. Retrying will not help.
    #[error("failed to load module: {0}")]
    LoadFailed(String),

    /// The module loaded but its backend is unreachable right now.
    #[error("backend offline: {0}")]
    Offline(String),
}

impl ConnectError {
    /// Returns true if the module should be disabled instead of retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LoadFailed(_))
    }
}

// ============================================================================
// Store Errors
// ============================================================================

/// Errors reported by the external identity and settings stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected {0}")]
    Rejected(String),
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Errors returned by the client registry and session engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PvrError {
    /// No client is registered under this identity.
    #[error("client not found: {0}")]
    NotFound(ClientId),

    /// The client is known but not connected, or lacks the capability.
    #[error("client {0} is not available")]
    ClientUnavailable(ClientId),

    /// The client does not implement the operation.
    #[error("client {client} does not support {operation}")]
    NotSupported {
        client: ClientId,
        operation: &'static str,
    },

    /// No registered client belongs to this module.
    #[error("unknown add-on: {0}")]
    UnknownAddon(AddonId),

    /// The identity store rejected the module, or the module is disabled.
    #[error("cannot register add-on {addon}: {reason}")]
    RegistrationFailed { addon: AddonId, reason: String },

    /// The module failed to come online.
    #[error("cannot connect add-on {addon}: {source}")]
    ConnectionFailed {
        addon: AddonId,
        #[source]
        source: ConnectError,
    },

    /// A channel switch is already in progress.
    #[error("a channel switch is already in progress")]
    SwitchBusy,

    /// No stream is open.
    #[error("no stream is playing")]
    NoActiveStream,

    /// No connected client can scan for channels.
    #[error("no client supports channel scanning")]
    NoScanClient,

    /// Several clients can scan; the caller has to pick one.
    #[error("{candidates} clients support channel scanning, pick one")]
    ScanClientRequired { candidates: usize },

    /// The settings store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The backend returned an error code.
    #[error("{operation} failed on client {client}: {source}")]
    Backend {
        client: ClientId,
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

impl PvrError {
    /// Maps a backend error code to an engine error.
    ///
    /// `NotImplemented` becomes [`PvrError::NotSupported`].
    pub fn backend(client: ClientId, operation: &'static str, source: BackendError) -> Self {
        if source.is_not_implemented() {
            Self::NotSupported { client, operation }
        } else {
            Self::Backend {
                client,
                operation,
                source,
            }
        }
    }

    /// Returns true for [`PvrError::NotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }
}

/// Result type for engine operations.
pub type PvrResult<T> = Result<T, PvrError>;
