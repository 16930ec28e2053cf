//! Estimation service configuration.
//!
//! [`ServerConfig`] is read once at start-up and shared behind the
//! application state. Every field has a default, so a partial JSON file is
//! enough.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when loading or validating a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ServerConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// The configuration file could not be read.
    #[error("Cannot read config file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServerConfigError {
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidValue { field, reason: reason.into() }
    }
}

/// Complete configuration of the estimation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // -----------------------------------------------------------------------
    // Network
    // -----------------------------------------------------------------------
    /// Interface to bind. Default: **`0.0.0.0`**.
    pub host: String,

    /// HTTP port. Default: **8000**.
    pub port: u16,

    /// Origins allowed by CORS. Empty allows any origin.
    /// Default: **`["http://localhost:4173"]`**.
    pub cors_origins: Vec<String>,

    // -----------------------------------------------------------------------
    // Models
    // -----------------------------------------------------------------------
    /// Directory holding the artifact sets. Default: **`models`**.
    pub models_dir: PathBuf,

    /// Artifact prefix of the position model. Default: **`2d`**.
    pub position_prefix: String,

    /// Artifact prefix of the floor model. Default: **`fd`**.
    pub floor_prefix: String,

    // -----------------------------------------------------------------------
    // Clock and tracker
    // -----------------------------------------------------------------------
    /// IANA zone of every timestamp in responses, e.g. `Europe/Madrid`.
    /// Daylight saving follows the zone's rules. Default: **`UTC`**.
    pub timezone: String,

    /// Age after which a device is flagged stale. Default: **60**.
    pub stale_after_secs: f64,

    /// Drop estimates older than the stored state of their device.
    /// Default: **true**.
    pub reject_out_of_order: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            // Network
            host: "0.0.0.0".to_owned(),
            port: 8000,
            cors_origins: vec!["http://localhost:4173".to_owned()],
            // Models
            models_dir: PathBuf::from("models"),
            position_prefix: "2d".to_owned(),
            floor_prefix: "fd".to_owned(),
            // Clock and tracker
            timezone: "UTC".to_owned(),
            stale_after_secs: 60.0,
            reject_out_of_order: true,
        }
    }
}

impl ServerConfig {
    /// Load and validate a [`ServerConfig`] from a JSON file at `path`.
    pub fn from_json(path: &Path) -> Result<Self, ServerConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ServerConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ServerConfig = serde_json::from_str(&contents)
            .map_err(|e| ServerConfigError::invalid_value("(file)", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate all fields and return the first problem found.
    pub fn validate(&self) -> Result<(), ServerConfigError> {
        self.bind_addr()?;
        self.tz()?;
        if self.position_prefix.trim().is_empty() {
            return Err(ServerConfigError::invalid_value("position_prefix", "must not be empty"));
        }
        if self.floor_prefix.trim().is_empty() {
            return Err(ServerConfigError::invalid_value("floor_prefix", "must not be empty"));
        }
        if !(self.stale_after_secs.is_finite() && self.stale_after_secs > 0.0) {
            return Err(ServerConfigError::invalid_value(
                "stale_after_secs",
                "must be a positive number",
            ));
        }
        Ok(())
    }

    /// Socket address built from `host` and `port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerConfigError::invalid_value("host", format!("'{}': {e}", self.host)))
    }

    /// The configured response zone, parsed from its IANA name.
    pub fn tz(&self) -> Result<Tz, ServerConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| {
            ServerConfigError::invalid_value("timezone", format!("'{}': {e}", self.timezone))
        })
    }
}
