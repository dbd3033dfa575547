//! PeerChat - A peer-to-peer chat session with clipboard sharing
//!
//! This library provides the core functionality for PeerChat, including:
//! - A single-peer TCP session (listen and dial, first writer wins)
//! - The `CLIPBOARD:` prefix wire format for text and clipboard messages
//! - Clipboard polling and synchronization with echo suppression
//! - Configuration management
//! - Logging infrastructure
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use peer_chat::{
//!     clipboard::SystemClipboard, config::ConfigManager, events::TracingSink, logging,
//!     node::PeerNode,
//! };
//!
//! # async fn run() -> peer_chat::Result<()> {
//! // Initialize logging
//! logging::init_logging(logging::LogLevel::Info);
//!
//! // Load configuration
//! let config = ConfigManager::new()?.load_or_create_default()?;
//!
//! // Start listening and wait for a peer
//! let node = PeerNode::start(&config, Arc::new(SystemClipboard::new()), Arc::new(TracingSink)).await?;
//! println!("Listening on {}", node.local_addr());
//!
//! node.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clipboard;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod network;
pub mod node;
pub mod session;

// Re-export commonly used types at crate root
pub use error::{PeerChatError, Result};
pub use node::PeerNode;
