//! Peer node
//!
//! Wires the listener, the session and the clipboard bridge together and
//! owns the shutdown signal they all observe. Dropping a `PeerNode` also
//! stops every task, since the shutdown sender goes with it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clipboard::{spawn_bridge, BridgeHandle, ClipboardEntry, ClipboardProvider};
use crate::config::{Config, PeerAddress};
use crate::error::{ClipboardResult, NetworkResult, Result};
use crate::events::EventSink;
use crate::network::PeerListener;
use crate::session::{spawn_session, SessionHandle, SessionStatus};

/// Inbound clipboard payloads waiting for the bridge
const CLIPBOARD_BUFFER: usize = 16;

/// A running chat peer
pub struct PeerNode {
    local_addr: SocketAddr,
    session: SessionHandle,
    bridge: BridgeHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl PeerNode {
    /// Binds the listener and starts every task
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the listen
    /// address cannot be bound. Nothing is left running in either case.
    pub async fn start(
        config: &Config,
        clipboard: Arc<dyn ClipboardProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let listener =
            PeerListener::bind(&config.network.bind_host, config.network.listen_port).await?;
        let local_addr = listener.local_addr();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (clipboard_tx, clipboard_rx) = mpsc::channel(CLIPBOARD_BUFFER);

        let (session, session_task) = spawn_session(
            config.network.connect_timeout(),
            Arc::clone(&sink),
            clipboard_tx,
            shutdown_rx.clone(),
        );

        let (bridge, bridge_task) = spawn_bridge(
            &config.clipboard,
            clipboard,
            session.clone(),
            sink,
            clipboard_rx,
            shutdown_rx.clone(),
        )
        .await;

        let acceptor = session.clone();
        let accept_task = tokio::spawn(
            listener.run(shutdown_rx, move |stream, remote| acceptor.offer(stream, remote)),
        );

        info!("Peer node listening on {}", local_addr);

        Ok(Self {
            local_addr,
            session,
            bridge,
            shutdown,
            tasks: vec![
                ("accept loop", accept_task),
                ("session", session_task),
                ("clipboard bridge", bridge_task),
            ],
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the session actor
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Dials a peer
    pub async fn connect(&self, peer: PeerAddress) -> NetworkResult<SocketAddr> {
        self.session.connect(peer).await
    }

    /// Sends chat text to the peer
    pub async fn send_text(&self, text: impl Into<String>) -> NetworkResult<()> {
        self.session.send_text(text).await
    }

    /// Drops the current peer link
    pub async fn disconnect(&self) -> NetworkResult<()> {
        self.session.disconnect().await
    }

    /// Returns a snapshot of the session
    pub async fn status(&self) -> NetworkResult<SessionStatus> {
        self.session.status().await
    }

    /// Turns clipboard sharing on or off
    pub fn set_sharing(&self, enabled: bool) {
        self.bridge.set_sharing(enabled);
    }

    /// Returns whether clipboard sharing is on
    pub fn sharing_enabled(&self) -> bool {
        self.bridge.sharing_enabled()
    }

    /// Returns the clipboard history, oldest first
    pub async fn history(&self) -> ClipboardResult<Vec<ClipboardEntry>> {
        self.bridge.history().await
    }

    /// Puts a history entry back on the local clipboard
    pub async fn recopy(&self, id: Uuid) -> ClipboardResult<()> {
        self.bridge.recopy(id).await
    }

    /// Removes a history entry
    pub async fn forget(&self, id: Uuid) -> ClipboardResult<()> {
        self.bridge.forget(id).await
    }

    /// Stops every task and waits for them to finish
    pub async fn shutdown(self) {
        info!("Shutting down peer node on {}", self.local_addr);
        self.shutdown.send_replace(true);

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!("{} task ended abnormally: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clipboard::{ClipboardOrigin, MemoryClipboard};
    use crate::config::Config;
    use crate::error::{ClipboardError, NetworkError, PeerChatError};
    use crate::events::TracingSink;

    fn local_config() -> Config {
        let mut config = Config::default();
        config.network.bind_host = "127.0.0.1".to_string();
        config.network.listen_port = 0;
        config
    }

    async fn start(config: &Config) -> Result<PeerNode> {
        PeerNode::start(
            config,
            Arc::new(MemoryClipboard::default()),
            Arc::new(TracingSink),
        )
        .await
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let node = start(&local_config()).await.unwrap();
        assert_ne!(node.local_addr().port(), 0);
        assert!(!node.session().is_connected());
        assert!(!node.sharing_enabled());

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let first = start(&local_config()).await.unwrap();

        let mut config = local_config();
        config.network.listen_port = first.local_addr().port();

        // SO_REUSEADDR does not allow two listeners on one port
        let result = start(&config).await;
        assert!(matches!(
            result,
            Err(PeerChatError::Network(NetworkError::Bind { .. }))
        ));

        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = local_config();
        config.clipboard.poll_interval_ms = 0;

        assert!(matches!(start(&config).await, Err(PeerChatError::Config(_))));
    }

    #[tokio::test]
    async fn test_sharing_toggle() {
        let node = start(&local_config()).await.unwrap();
        node.set_sharing(true);
        assert!(node.sharing_enabled());
        assert!(node.history().await.unwrap().is_empty());
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_change_right_after_start_is_seen() {
        let mut config = local_config();
        config.clipboard.poll_interval_ms = 20;

        let clipboard = Arc::new(MemoryClipboard::with_text("x"));
        let provider: Arc<dyn ClipboardProvider> = clipboard.clone();
        let node = PeerNode::start(&config, provider, Arc::new(TracingSink))
            .await
            .unwrap();

        // Before the bridge task has had a chance to run
        clipboard.write("y").unwrap();

        let entry = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(entry) = node.history().await.unwrap().pop() {
                    return entry;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Change was absorbed into the baseline");
        assert_eq!(entry.content, "y");
        assert_eq!(entry.origin, ClipboardOrigin::Local);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_forget_history_entry() {
        let mut config = local_config();
        config.clipboard.poll_interval_ms = 20;

        let clipboard = Arc::new(MemoryClipboard::default());
        let provider: Arc<dyn ClipboardProvider> = clipboard.clone();
        let node = PeerNode::start(&config, provider, Arc::new(TracingSink))
            .await
            .unwrap();

        clipboard.write("secret").unwrap();
        let id = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(entry) = node.history().await.unwrap().pop() {
                    return entry.id;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        node.forget(id).await.unwrap();
        assert!(node.history().await.unwrap().is_empty());
        assert!(matches!(
            node.forget(id).await,
            Err(ClipboardError::EntryNotFound(missing)) if missing == id
        ));

        node.shutdown().await;
    }
}
