//! Clipboard module
//!
//! Local clipboard access, the bounded clipboard history, and the bridge
//! that keeps the local clipboard in step with the peer.

pub mod bridge;
pub mod history;
pub mod provider;

pub use bridge::{spawn_bridge, BridgeHandle};
pub use history::{ClipboardEntry, ClipboardHistory, ClipboardOrigin};
pub use provider::{ClipboardProvider, MemoryClipboard, SystemClipboard};
