//! Error types for PeerChat
//!
//! This module defines all error types used throughout the application.
//! Link-level failures are recoverable and never escape the session actor
//! as a crash; only listener setup (`NetworkError::Bind`) is fatal.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Main error type for PeerChat
#[derive(Error, Debug)]
pub enum PeerChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Clipboard access errors
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to create configuration directory: {0}")]
    DirectoryCreationFailed(String),
}

/// Network and session errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Listener setup failed; fatal at startup
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Outbound dial failed
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// Outbound dial did not complete in time
    #[error("Connection to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    /// Send or receive failed on an established link
    #[error("Link to {remote} failed: {reason}")]
    Link { remote: SocketAddr, reason: String },

    #[error("Already connected to a peer")]
    AlreadyConnected,

    #[error("Not connected to a peer")]
    NotConnected,

    #[error("A connection attempt is already in progress")]
    DialInProgress,

    /// The session actor has stopped
    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

/// Clipboard access errors
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Failed to access clipboard: {0}")]
    Unavailable(String),

    #[error("Failed to read clipboard: {0}")]
    ReadFailed(String),

    #[error("Failed to write clipboard: {0}")]
    WriteFailed(String),

    #[error("Clipboard history entry not found: {0}")]
    EntryNotFound(uuid::Uuid),

    #[error("Clipboard bridge stopped")]
    BridgeClosed,
}

/// Type alias for Results using PeerChatError
pub type Result<T> = std::result::Result<T, PeerChatError>;

/// Type alias for Config Results
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Type alias for Network Results
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Type alias for Clipboard Results
pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;
