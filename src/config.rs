//! Application configuration.
//!
//! Settings are layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `QRATTEND_*` environment variables (e.g. `QRATTEND_SERVER_URL`)
//! 4. Command-line flags, applied by the caller
//!
//! ```toml
//! server_url = "https://attendance.example.edu"
//! resume_delay_ms = 1500
//!
//! [[devices]]
//! label = "Front desk (back)"
//! path = "/dev/ttyACM0"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::LineDevice;
use crate::client::resolve_endpoint;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "QRATTEND_";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to save configuration: {0}")]
    Save(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the attendance server.
    pub server_url: String,
    /// Scan endpoint, relative to `server_url` or absolute.
    pub api_endpoint: String,
    /// Identifier of the preview surface.
    pub container_id: String,
    /// Delay before scanning resumes after a duplicate or error.
    pub resume_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Play a cue when a code is accepted.
    pub beep: bool,
    /// Decode attempts per second requested from the backend.
    pub fps: u32,
    /// Line devices offered as cameras.
    pub devices: Vec<LineDevice>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "https://localhost:5000".to_string(),
            api_endpoint: "/api/scan-qr".to_string(),
            container_id: "qr-reader".to_string(),
            resume_delay_ms: 2000,
            request_timeout_secs: 30,
            beep: true,
            fps: 10,
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file or environment holds
    /// malformed values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path(),
        };
        Self::figment(path.as_deref())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load defaults and `path` only, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file is malformed.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::figment(Some(path))
            .extract()
            .map_err(ConfigError::from)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                figment.merge(Toml::file(path))
            }
            None => figment,
        }
    }

    /// Default platform-specific configuration file.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("edu", "qrattend", "qrattend")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Save`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Save(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Save(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::Save(e.to_string()))
    }

    /// Check values that would only fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("api_endpoint cannot be empty".into()));
        }
        if self.container_id.trim().is_empty() {
            return Err(ConfigError::Invalid("container_id cannot be empty".into()));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        resolve_endpoint(&self.server_url, &self.api_endpoint)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
