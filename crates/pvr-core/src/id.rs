//! Type-safe identifiers for backend clients and their modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Client Identity
// ============================================================================

/// Stable identifier of a backend client.
///
/// Assigned by the identity store the first time a module is registered and
/// reused for that module afterwards. Only values greater than zero name a
/// real client; zero and negative values are reserved sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(i32);

impl ClientId {
    /// No client. Returned by accessors when nothing is playing.
    pub const INVALID: ClientId = ClientId(-2);

    /// The aggregate client that owns channels not backed by a real module.
    pub const VIRTUAL: ClientId = ClientId(-1);

    /// Creates an identifier from its raw value.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns true if this identifier can name a registered client.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// Returns true for the virtual sentinel.
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        self.0 == Self::VIRTUAL.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClientId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

// ============================================================================
// Addon Identity
// ============================================================================

/// Identifier of a backend module as published by the addon source.
///
/// Example: "pvr.hts", "pvr.mythtv".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddonId(String);

impl AddonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AddonId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AddonId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for AddonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
