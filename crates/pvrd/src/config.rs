//! TOML configuration for the client engine and the `pvrd` binary.
//!
//! The configuration file lives at `$XDG_CONFIG_HOME/pvrd/pvrd.toml`
//! (typically `~/.config/pvrd/pvrd.toml`) unless `PVRD_CONFIG` points
//! elsewhere. A missing file is not an error.
//!
//! # Priority
//!
//! 1. Environment variables (`PVRD_POLL_INTERVAL_MS`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example
//!
//! ```toml
//! [clients]
//! poll_interval_ms = 2000
//! refresh_signal_status = true
//! notify_when_no_clients = true
//!
//! [[backend]]
//! id = "pvr.iptv"
//! name = "IPTV playlist"
//!
//! [[backend.channels]]
//! uid = 1
//! name = "News 24"
//! url = "http://iptv.example/news24.ts"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use pvr_addon::StaticBackendConfig;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "PVRD_CONFIG";

/// Environment variable overriding `clients.poll_interval_ms`.
pub const POLL_INTERVAL_ENV: &str = "PVRD_POLL_INTERVAL_MS";

/// Default supervisor poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Lower bound for the supervisor poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Settings of the client engine (`[clients]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientsConfig {
    /// Supervisor poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Ask the playing client to refresh its signal status on every poll
    pub refresh_signal_status: bool,

    /// Notify once per run when no backend module is enabled
    pub notify_when_no_clients: bool,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            refresh_signal_status: true,
            notify_when_no_clients: true,
        }
    }
}

impl ClientsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the poll interval is below
    /// [`MIN_POLL_INTERVAL_MS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "clients.poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }

    /// Applies overrides read through `lookup` (normally `std::env::var`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if an override does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: POLL_INTERVAL_ENV,
                        value: value.clone(),
                    })?;
            debug!(poll_interval_ms = self.poll_interval_ms, "Poll interval set from environment");
        }
        Ok(())
    }
}

// ============================================================================
// Daemon Configuration File
// ============================================================================

/// Contents of `pvrd.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvrdConfig {
    pub clients: ClientsConfig,

    /// Static backends served by the daemon
    #[serde(rename = "backend")]
    pub backends: Vec<StaticBackendConfig>,
}

impl PvrdConfig {
    /// Parses a configuration document and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML, invalid values, or duplicate
    /// backend ids.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and backend id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clients.validate()?;

        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err(ConfigError::Invalid("backend id must not be empty".to_string()));
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate backend id {:?}",
                    backend.id
                )));
            }
        }
        Ok(())
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Returns `$XDG_CONFIG_HOME/pvrd/pvrd.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pvrd").join("pvrd.toml"))
}

/// Resolves the configuration path: `PVRD_CONFIG` first, then the default.
#[must_use]
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(default_config_path)
}

/// Loads configuration from `path` and applies environment overrides.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// an environment override is invalid.
pub fn load_config_from_path(path: Option<&Path>) -> Result<PvrdConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            let config = PvrdConfig::from_toml_str(&content)?;
            info!(
                path = %path.display(),
                backends = config.backends.len(),
                "Loaded configuration from file"
            );
            config
        }
        Some(path) => {
            debug!(path = %path.display(), "Config file not found, using defaults");
            PvrdConfig::default()
        }
        None => PvrdConfig::default(),
    };

    config
        .clients
        .apply_overrides(|name| std::env::var(name).ok())?;
    config.clients.validate()?;
    Ok(config)
}

/// Loads configuration from the path named by the environment or the
/// default location.
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_config() -> Result<PvrdConfig, ConfigError> {
    load_config_from_path(config_path_from_env().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_clients_config() {
        let config = ClientsConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.refresh_signal_status);
        assert!(config.notify_when_no_clients);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("pvrd/pvrd.toml"));
        }
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = PvrdConfig::from_toml_str(
            r#"
            [clients]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.clients.poll_interval_ms, 250);
        assert!(config.clients.refresh_signal_status);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_parse_backends() {
        let config = PvrdConfig::from_toml_str(
            r#"
            [[backend]]
            id = "pvr.iptv"
            name = "IPTV"

            [[backend.channels]]
            uid = 1
            name = "News"
            url = "http://iptv.example/news.ts"

            [[backend]]
            id = "pvr.radio"
            name = "Radio"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].channels.len(), 1);
        assert!(!config.backends[1].enabled);
    }

    #[test]
    fn test_duplicate_backend_ids_rejected() {
        let result = PvrdConfig::from_toml_str(
            r#"
            [[backend]]
            id = "pvr.iptv"
            name = "one"

            [[backend]]
            id = "pvr.iptv"
            name = "two"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_poll_interval_too_small() {
        let result = PvrdConfig::from_toml_str("[clients]\npoll_interval_ms = 1\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[clients\npoll_interval_ms = ").unwrap();

        let result = load_config_from_path(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[clients]\nnotify_when_no_clients = false\n")
            .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert!(!config.clients.notify_when_no_clients);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            load_config_from_path(Some(Path::new("/nonexistent/pvrd/pvrd.toml"))).unwrap();
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_overrides_apply() {
        let vars: HashMap<&str, &str> = [(POLL_INTERVAL_ENV, " 500 ")].into_iter().collect();
        let mut config = ClientsConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = ClientsConfig::default();
        let result = config.apply_overrides(|_| Some("soon".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { name: POLL_INTERVAL_ENV, .. })
        ));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PvrdConfig {
            clients: ClientsConfig::default().with_poll_interval(Duration::from_millis(750)),
            backends: Vec::new(),
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PvrdConfig::from_toml_str(&text).unwrap(), config);
    }
}
