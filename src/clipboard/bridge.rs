//! Clipboard bridge
//!
//! Polls the local clipboard and pushes changes to the peer through the
//! session, and applies clipboard payloads received from the peer. Runs as
//! one task so the poll baseline is only ever touched from one place.
//!
//! With `suppress_echo` set, a payload written on behalf of the peer also
//! becomes the new baseline, so the next poll does not send it straight
//! back. Without it the next poll sees a change and re-sends the payload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clipboard::history::{ClipboardEntry, ClipboardHistory, ClipboardOrigin};
use crate::clipboard::provider::ClipboardProvider;
use crate::config::ClipboardConfig;
use crate::error::{ClipboardError, ClipboardResult};
use crate::events::{status, EventSink};
use crate::network::Message;
use crate::session::SessionHandle;

/// Bridge command channel capacity
const COMMAND_BUFFER: usize = 8;

enum BridgeCommand {
    History {
        respond_to: oneshot::Sender<Vec<ClipboardEntry>>,
    },
    Recopy {
        id: Uuid,
        respond_to: oneshot::Sender<ClipboardResult<()>>,
    },
    Forget {
        id: Uuid,
        respond_to: oneshot::Sender<ClipboardResult<()>>,
    },
}

/// Cloneable handle for the clipboard bridge
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::Sender<BridgeCommand>,
    sharing: Arc<AtomicBool>,
}

impl BridgeHandle {
    /// Turns clipboard sharing on or off
    pub fn set_sharing(&self, enabled: bool) {
        self.sharing.store(enabled, Ordering::SeqCst);
        info!(
            "Clipboard sharing {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Returns whether clipboard sharing is on
    pub fn sharing_enabled(&self) -> bool {
        self.sharing.load(Ordering::SeqCst)
    }

    /// Returns the remembered clipboard entries, oldest first
    pub async fn history(&self) -> ClipboardResult<Vec<ClipboardEntry>> {
        let (respond_to, rx) = oneshot::channel();
        self.commands
            .send(BridgeCommand::History { respond_to })
            .await
            .map_err(|_| ClipboardError::BridgeClosed)?;
        rx.await.map_err(|_| ClipboardError::BridgeClosed)
    }

    /// Puts a remembered entry back on the local clipboard
    ///
    /// The next poll treats it as a local change.
    pub async fn recopy(&self, id: Uuid) -> ClipboardResult<()> {
        let (respond_to, rx) = oneshot::channel();
        self.commands
            .send(BridgeCommand::Recopy { id, respond_to })
            .await
            .map_err(|_| ClipboardError::BridgeClosed)?;
        rx.await.map_err(|_| ClipboardError::BridgeClosed)?
    }

    /// Drops a remembered entry from the history
    ///
    /// The clipboard itself is left alone.
    pub async fn forget(&self, id: Uuid) -> ClipboardResult<()> {
        let (respond_to, rx) = oneshot::channel();
        self.commands
            .send(BridgeCommand::Forget { id, respond_to })
            .await
            .map_err(|_| ClipboardError::BridgeClosed)?;
        rx.await.map_err(|_| ClipboardError::BridgeClosed)?
    }
}

/// Spawns the clipboard bridge
///
/// The current clipboard becomes the poll baseline before this returns, so
/// any change made afterwards is picked up by the first poll. `inbound`
/// carries clipboard payloads decoded from the peer. The bridge stops when
/// `shutdown` flips to true or every handle is dropped.
pub async fn spawn_bridge(
    config: &ClipboardConfig,
    provider: Arc<dyn ClipboardProvider>,
    session: SessionHandle,
    sink: Arc<dyn EventSink>,
    inbound: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
) -> (BridgeHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let sharing = Arc::new(AtomicBool::new(config.enabled));

    let mut bridge = ClipboardBridge {
        provider,
        session,
        sink,
        sharing: Arc::clone(&sharing),
        suppress_echo: config.suppress_echo,
        poll_interval: config.poll_interval(),
        baseline: String::new(),
        history: ClipboardHistory::new(config.history_capacity),
    };

    match bridge.read_clipboard().await {
        Ok(text) => bridge.baseline = text,
        Err(e) => warn!("Initial clipboard read failed: {}", e),
    }

    let task = tokio::spawn(bridge.run(commands_rx, inbound, shutdown));
    (
        BridgeHandle {
            commands: commands_tx,
            sharing,
        },
        task,
    )
}

struct ClipboardBridge {
    provider: Arc<dyn ClipboardProvider>,
    session: SessionHandle,
    sink: Arc<dyn EventSink>,
    sharing: Arc<AtomicBool>,
    suppress_echo: bool,
    poll_interval: Duration,
    /// Last observed local clipboard text
    baseline: String,
    history: ClipboardHistory,
}

impl ClipboardBridge {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<BridgeCommand>,
        mut inbound: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound_open = true;

        info!("Clipboard bridge started ({:?} poll)", self.poll_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => self.poll().await,
                payload = inbound.recv(), if inbound_open => match payload {
                    Some(content) => self.apply_remote(content).await,
                    None => inbound_open = false,
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        info!("Clipboard bridge stopped");
    }

    async fn handle(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::History { respond_to } => {
                let _ = respond_to.send(self.history.snapshot());
            }
            BridgeCommand::Recopy { id, respond_to } => {
                let result = match self.history.get(id) {
                    Some(entry) => self.write_clipboard(entry.content.clone()).await,
                    None => Err(ClipboardError::EntryNotFound(id)),
                };
                let _ = respond_to.send(result);
            }
            BridgeCommand::Forget { id, respond_to } => {
                let result = match self.history.remove(id) {
                    Some(_) => {
                        debug!("Forgot clipboard entry {}", id);
                        Ok(())
                    }
                    None => Err(ClipboardError::EntryNotFound(id)),
                };
                let _ = respond_to.send(result);
            }
        }
    }

    async fn poll(&mut self) {
        let current = match self.read_clipboard().await {
            Ok(text) => text,
            Err(e) => {
                debug!("Clipboard read failed: {}", e);
                return;
            }
        };

        if current == self.baseline {
            return;
        }

        self.baseline = current.clone();
        self.history.record(ClipboardOrigin::Local, &current);
        debug!("Local clipboard changed: {} chars", current.len());

        if !self.sharing.load(Ordering::SeqCst) || !self.session.is_connected() {
            return;
        }

        if let Err(e) = self.session.send(Message::ClipboardUpdate(current)).await {
            warn!("Failed to share clipboard change: {}", e);
        }
    }

    async fn apply_remote(&mut self, content: String) {
        if !self.sharing.load(Ordering::SeqCst) {
            debug!("Clipboard sharing disabled, ignoring update from peer");
            return;
        }

        if let Err(e) = self.write_clipboard(content.clone()).await {
            warn!("Failed to apply clipboard from peer: {}", e);
            return;
        }

        if self.suppress_echo {
            self.baseline = content.clone();
        }
        self.history.record(ClipboardOrigin::Remote, &content);
        self.sink.notify(&status::clipboard_received(&content));
    }

    // Clipboard backends can block, so calls go through the blocking pool
    async fn read_clipboard(&self) -> ClipboardResult<String> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.read())
            .await
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?
    }

    async fn write_clipboard(&self, text: String) -> ClipboardResult<()> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.write(&text))
            .await
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?
    }
}
