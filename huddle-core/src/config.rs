//! Static call configuration
//!
//! A session is configured by a fixed application identifier, a channel
//! name, and a temporary authentication token, all read once at startup.
//! There is no dynamic negotiation; a config file and `HUDDLE_*` environment
//! variables are the only sources.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable carrying the application identifier
pub const ENV_APP_ID: &str = "HUDDLE_APP_ID";
/// Environment variable carrying the channel name
pub const ENV_CHANNEL: &str = "HUDDLE_CHANNEL";
/// Environment variable carrying the temporary auth token
pub const ENV_TOKEN: &str = "HUDDLE_TOKEN";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("could not read config file {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for a call config
    #[error("could not parse config file {path}: {source}")]
    Parse {
        /// Offending path
        path: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// A required field is empty or missing from every source
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
}

/// Static configuration for one call session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Application identifier issued by the engine vendor
    pub app_id: String,
    /// Channel to join
    pub channel: String,
    /// Temporary authentication token, if the channel requires one
    #[serde(default)]
    pub token: Option<String>,
}

impl CallConfig {
    /// Create a config with no token
    #[must_use]
    pub fn new(app_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            channel: channel.into(),
            token: None,
        }
    }

    /// Attach a temporary auth token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Check that the required fields are present
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the app id or channel is
    /// empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::MissingField("app_id"));
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::MissingField("channel"));
        }
        Ok(())
    }

    /// Load and validate a config from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from `HUDDLE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the app id or channel
    /// variable is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            app_id: std::env::var(ENV_APP_ID).unwrap_or_default(),
            channel: std::env::var(ENV_CHANNEL).unwrap_or_default(),
            token: std::env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a config, preferring a file and overlaying environment variables
    ///
    /// With a path, the file is loaded and any set `HUDDLE_*` variable
    /// replaces the corresponding field; without one, the environment is the
    /// only source.
    ///
    /// # Errors
    ///
    /// Returns an error when no source yields a valid config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::from_env();
        };
        let mut config = Self::from_file(path)?;
        if let Ok(app_id) = std::env::var(ENV_APP_ID) {
            if !app_id.is_empty() {
                config.app_id = app_id;
            }
        }
        if let Ok(channel) = std::env::var(ENV_CHANNEL) {
            if !channel.is_empty() {
                config.channel = channel;
            }
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.is_empty() {
                config.token = Some(token);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_rejects_empty_fields() {
        let missing_app = CallConfig::new("", "main");
        assert!(matches!(
            missing_app.validate(),
            Err(ConfigError::MissingField("app_id"))
        ));

        let missing_channel = CallConfig::new("app", "  ");
        assert!(matches!(
            missing_channel.validate(),
            Err(ConfigError::MissingField("channel"))
        ));

        assert!(CallConfig::new("app", "main").validate().is_ok());
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"app_id": "demo-app", "channel": "standup", "token": "tmp-007"}}"#
        )
        .unwrap();

        let config = CallConfig::from_file(file.path()).unwrap();
        assert_eq!(config.app_id, "demo-app");
        assert_eq!(config.channel, "standup");
        assert_eq!(config.token.as_deref(), Some("tmp-007"));
    }

    #[test]
    fn test_from_file_token_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"app_id": "demo-app", "channel": "standup"}}"#).unwrap();

        let config = CallConfig::from_file(file.path()).unwrap();
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(matches!(
            CallConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            CallConfig::from_file(&path),
            Err(ConfigError::Io { .. })
        ));
    }
}
