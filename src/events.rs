//! Event sink for human-readable status lines
//!
//! Every connect, disconnect, send, receive and error outcome produces one
//! line for display. The sink is fire-and-forget: implementations must not
//! block the caller.

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Consumer of status and message lines
pub trait EventSink: Send + Sync {
    /// Delivers one line
    fn notify(&self, text: &str);
}

/// Sink that forwards every line into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Creates a sink together with the receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, text: &str) {
        if self.tx.send(text.to_string()).is_err() {
            debug!("Event receiver dropped, discarding: {}", text);
        }
    }
}

/// Sink that writes every line to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, text: &str) {
        info!("{}", text);
    }
}

/// Status line texts
pub(crate) mod status {
    use std::fmt::Display;

    pub const ALREADY_CONNECTED: &str = "Already connected to a peer";
    pub const NOT_CONNECTED: &str = "Not connected to a peer";
    pub const DISCONNECTED: &str = "Disconnected from peer";
    pub const SEND_FAILED: &str = "Failed to send message";
    pub const CLIPBOARD_SEND_FAILED: &str = "Failed to send clipboard content";

    pub fn accepted(addr: impl Display) -> String {
        format!("Connected with {}", addr)
    }

    pub fn dialed(addr: impl Display) -> String {
        format!("Connected to peer at {}", addr)
    }

    pub fn connect_failed(reason: impl Display) -> String {
        format!("Failed to connect: {}", reason)
    }

    pub fn peer_text(text: &str) -> String {
        format!("Peer: {}", text)
    }

    pub fn own_text(text: &str) -> String {
        format!("You: {}", text)
    }

    pub fn clipboard_sent(content: &str) -> String {
        format!("Clipboard content sent: {}", content)
    }

    pub fn clipboard_received(content: &str) -> String {
        format!("Received clipboard content: {}", content)
    }
}
