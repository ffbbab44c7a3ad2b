//! # Configuration
//!
//! Optional TOML file read with `--config/-c`. Every key has a default, so
//! an empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! simulate_latency = true
//!
//! [poll]
//! interval_ms = 2000
//!
//! [moderation]
//! blocked_terms = ["spam"]
//!
//! [alerts]
//! enabled = true
//! ```

use parlor_core::primitives::DEFAULT_POLL_INTERVAL;
use parlor_core::{AllowAll, BlocklistModerator, Moderator, ParlorError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Smallest accepted refresh interval.
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Await the simulated sign-up and login latency.
    #[serde(default = "default_true")]
    pub simulate_latency: bool,
}

/// Refresh polling settings for `parlor watch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Content moderation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Posts containing any of these terms are rejected.
    #[serde(default)]
    pub blocked_terms: Vec<String>,
}

/// Platform alert settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Stands in for the platform permission grant.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(2000)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            simulate_latency: default_true(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl ParlorConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ParlorError> {
        toml::from_str(text).map_err(|e| ParlorError::SerializationError(format!("Config: {e}")))
    }

    /// Load the configuration at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ParlorError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            ParlorError::IoError(format!("Cannot read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// The `host:port` address the server binds to.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Refresh interval, clamped to a sane minimum.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// The moderator described by `[moderation]`.
    #[must_use]
    pub fn moderator(&self) -> Arc<dyn Moderator> {
        if self.moderation.blocked_terms.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(BlocklistModerator::new(&self.moderation.blocked_terms))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parlor_core::Verdict;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ParlorConfig::from_toml_str("").unwrap();
        assert_eq!(config, ParlorConfig::default());
        assert_eq!(config.server_addr(), "127.0.0.1:8080");
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(config.alerts.enabled);
        assert!(config.server.simulate_latency);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ParlorConfig::from_toml_str(
            "[server]\nport = 9000\n\n[moderation]\nblocked_terms = [\"spam\"]\n",
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.moderation.blocked_terms, vec!["spam".to_string()]);
        assert!(matches!(
            config.moderator().review("buy SPAM now"),
            Verdict::Reject { .. }
        ));
    }

    #[test]
    fn tiny_interval_is_clamped() {
        let config = ParlorConfig::from_toml_str("[poll]\ninterval_ms = 1\n").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            ParlorConfig::from_toml_str("[server\nport ="),
            Err(ParlorError::SerializationError(_))
        ));
    }

    #[test]
    fn load_without_path_and_from_file() {
        assert_eq!(ParlorConfig::load(None).unwrap(), ParlorConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parlor.toml");
        std::fs::write(&path, "[alerts]\nenabled = false\n").unwrap();
        let config = ParlorConfig::load(Some(&path)).unwrap();
        assert!(!config.alerts.enabled);

        assert!(matches!(
            ParlorConfig::load(Some(&dir.path().join("missing.toml"))),
            Err(ParlorError::IoError(_))
        ));
    }
}
