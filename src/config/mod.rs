//! Configuration management for PeerChat
//!
//! This module handles application configuration including:
//! - Loading and saving the configuration file
//! - Managing the configuration directory
//! - Providing sensible defaults
//! - Configuration validation

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
/// Default TCP port the listener binds to
pub const DEFAULT_LISTEN_PORT: u16 = 5000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_HISTORY_CAPACITY: usize = 50;

const MIN_POLL_INTERVAL_MS: u64 = 10;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
const MAX_HISTORY_CAPACITY: usize = 1000;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// Clipboard configuration
    pub clipboard: ClipboardConfig,
}

/// Remote endpoint as typed by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl PeerAddress {
    /// Creates a new peer address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Network-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local host to bind the listener on
    pub bind_host: String,

    /// Port to listen on (0 for random)
    pub listen_port: u16,

    /// Upper bound on an outbound dial, in milliseconds
    pub connect_timeout_ms: u64,

    /// Last peer dialed successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_peer: Option<PeerAddress>,
}

/// Clipboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Clipboard sharing toggle at startup
    pub enabled: bool,

    /// Interval between local clipboard polls in milliseconds
    pub poll_interval_ms: u64,

    /// Treat content written from the peer as already seen locally, so it
    /// is not sent straight back
    pub suppress_echo: bool,

    /// Number of clipboard entries kept in memory
    pub history_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            last_peer: None,
        }
    }
}

impl NetworkConfig {
    /// Returns the dial timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            suppress_echo: true,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl ClipboardConfig {
    /// Returns the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Validates configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.network.bind_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "Bind host must not be empty".to_string(),
            ));
        }

        if self.network.connect_timeout_ms < MIN_CONNECT_TIMEOUT_MS {
            return Err(ConfigError::InvalidValue(format!(
                "Connect timeout must be at least {} ms",
                MIN_CONNECT_TIMEOUT_MS
            )));
        }

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS)
            .contains(&self.clipboard.poll_interval_ms)
        {
            return Err(ConfigError::InvalidValue(format!(
                "Clipboard poll interval must be between {} and {} ms",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS
            )));
        }

        if self.clipboard.history_capacity == 0
            || self.clipboard.history_capacity > MAX_HISTORY_CAPACITY
        {
            return Err(ConfigError::InvalidValue(format!(
                "Clipboard history capacity must be between 1 and {}",
                MAX_HISTORY_CAPACITY
            )));
        }

        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Creates a ConfigManager rooted at the platform config directory
    ///
    /// # Errors
    ///
    /// Returns error if project directory cannot be determined
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::get_config_directory()?;
        Ok(Self::with_directory(config_dir))
    }

    /// Creates a ConfigManager rooted at an explicit directory
    pub fn with_directory(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        Self {
            config_dir,
            config_file,
        }
    }

    fn get_config_directory() -> ConfigResult<PathBuf> {
        ProjectDirs::from("com", "peerchat", "PeerChat")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::DirectoryNotFound(
                    "Could not determine configuration directory".to_string(),
                )
            })
    }

    fn ensure_config_directory(&self) -> ConfigResult<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).map_err(|e| {
                ConfigError::DirectoryCreationFailed(format!(
                    "Failed to create config directory at {:?}: {}",
                    self.config_dir, e
                ))
            })?;
        }
        Ok(())
    }

    /// Loads configuration from file, or creates default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be loaded or created
    pub fn load_or_create_default(&self) -> ConfigResult<Config> {
        self.ensure_config_directory()?;

        if self.config_file.exists() {
            self.load()
        } else {
            let config = Config::default();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn load(&self) -> ConfigResult<Config> {
        let content = fs::read_to_string(&self.config_file).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file
    ///
    /// # Errors
    ///
    /// Returns error if configuration cannot be saved
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.ensure_config_directory()?;
        config.validate()?;

        let content = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&self.config_file, content).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Gets the path to the configuration file
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Gets the configuration directory path
    pub fn config_directory(&self) -> &Path {
        &self.config_dir
    }
}
