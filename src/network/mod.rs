//! Network module for PeerChat
//!
//! This module handles the raw TCP side of a peer link:
//! - Listening for and dialing peer connections
//! - Encoding and decoding messages on the byte stream

pub mod framer;
pub mod transport;

// Re-export commonly used types
pub use framer::{read_message, Message, CLIPBOARD_PREFIX, READ_UNIT};
pub use transport::{dial, PeerListener};
