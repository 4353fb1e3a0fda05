//! Configuration management for the OpenVPN manager.
//!
//! This module provides functionality for loading and parsing configuration
//! settings for the manager daemon and the control CLI. Configuration is
//! read from a TOML file; every field carries a default matching the
//! historical filesystem layout, so a missing or partial file still yields a
//! working setup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    /// Error parsing TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),
}

/// Filesystem layout settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding the two protocol pipes (default: "/var/run")
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,

    /// Management root holding profiles, the selection link and the log
    /// file (default: "/root/.openvpn-management")
    #[serde(default = "default_management_dir")]
    pub management_dir: PathBuf,
}

fn default_runtime_dir() -> PathBuf {
    PathBuf::from("/var/run")
}

fn default_management_dir() -> PathBuf {
    PathBuf::from("/root/.openvpn-management")
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            runtime_dir: default_runtime_dir(),
            management_dir: default_management_dir(),
        }
    }
}

/// Tunnel process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    /// Program spawned by CONNECT; it receives the selection-link path as
    /// its only argument (default: "openvpn")
    #[serde(default = "default_tunnel_program")]
    pub program: String,
}

fn default_tunnel_program() -> String {
    "openvpn".to_string()
}

impl Default for TunnelConfig {
    fn default() -> Self {
        TunnelConfig {
            program: default_tunnel_program(),
        }
    }
}

/// Top-level configuration for the manager components.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Filesystem layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Tunnel process
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Directory the profile files live in.
    pub fn profiles_dir(&self) -> PathBuf {
        self.paths.management_dir.join("vpns")
    }

    /// Symlink naming the currently selected profile.
    pub fn current_link(&self) -> PathBuf {
        self.paths.management_dir.join("current")
    }

    /// Staging path the selection link is built at before being renamed
    /// over [`Config::current_link`]. Lives outside the profiles directory,
    /// so no profile name can collide with it.
    pub fn staging_link(&self) -> PathBuf {
        self.paths.management_dir.join("current.staging")
    }

    /// The daemon's log file.
    pub fn log_file(&self) -> PathBuf {
        self.paths.management_dir.join("log.txt")
    }
}
