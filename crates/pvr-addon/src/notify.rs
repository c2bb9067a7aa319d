//! One-shot user-facing notifications.

use std::fmt;

use tracing::warn;

/// Kind of notification raised by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// No backend module is enabled. Raised at most once per run.
    NoClientsEnabled,
    /// A module failed to register or load and was disabled.
    ClientDisabled,
    /// A channel scan was requested but no client can scan.
    NoScanClients,
    /// A channel scan failed.
    ScanFailed,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoClientsEnabled => write!(f, "no clients enabled"),
            Self::ClientDisabled => write!(f, "client disabled"),
            Self::NoScanClients => write!(f, "no scan clients"),
            Self::ScanFailed => write!(f, "scan failed"),
        }
    }
}

/// Receives notifications. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        warn!(kind = %kind, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(NotificationKind::NoClientsEnabled.to_string(), "no clients enabled");
        assert_eq!(NotificationKind::ScanFailed.to_string(), "scan failed");
    }
}
