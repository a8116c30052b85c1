//! Configuration for the VRLink daemon
//!
//! Loads configuration from a TOML file with the minimal parameters needed
//! to run the protocol engine.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub app: AppInfoConfig,
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address the VR client connects to
    ///
    /// Examples:
    /// - `0.0.0.0:8779` - Bind to all interfaces on the default port
    /// - `127.0.0.1:8779` - Localhost only
    pub bind_address: String,
}

/// Client-facing application info
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppInfoConfig {
    /// Window title reported to the VR client on session creation
    pub title: String,
    /// Publish a small textured demo quad at startup
    pub demo_scene: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); RUST_LOG wins
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                bind_address: "0.0.0.0:8779".to_string(),
            },
            app: AppInfoConfig {
                title: "VRLink".to_string(),
                demo_scene: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
