//! Session actor
//!
//! A single task owns the peer link. Accepts, dials, sends, disconnects and
//! failure reports all arrive as [`SessionCommand`]s on one channel and are
//! handled one at a time, so no two of them can observe a half-built or
//! half-torn-down link.
//!
//! Policies:
//! - First writer wins: while a link exists, inbound connections are closed
//!   immediately and dials are refused before touching the network.
//! - An inbound connection that arrives while our own dial is still in
//!   flight takes the slot; the dialed stream is closed when it completes.
//! - Failure reports carry the link id. A report for anything but the
//!   current link is ignored, so teardown happens exactly once.
//! - Sends are handed to the link's write loop. The actor never waits on
//!   the socket, so a peer that stops reading cannot stall it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PeerAddress;
use crate::error::{NetworkError, NetworkResult};
use crate::events::{status, EventSink};
use crate::network::{self, Message};
use crate::session::link::{InboundRouter, LinkContext, LinkId, LinkOrigin, LinkStats, PeerLink};
use crate::session::state::{SessionState, SessionStateMachine};

/// Command channel capacity
const COMMAND_BUFFER: usize = 32;

/// Commands handled by the session actor
pub(crate) enum SessionCommand {
    /// An inbound stream from the accept loop
    Accept {
        stream: TcpStream,
        remote: SocketAddr,
    },
    /// User asked to connect
    Dial {
        peer: PeerAddress,
        respond_to: oneshot::Sender<NetworkResult<SocketAddr>>,
    },
    /// A dial task finished
    DialCompleted {
        dial_id: u64,
        peer: PeerAddress,
        result: NetworkResult<TcpStream>,
        respond_to: oneshot::Sender<NetworkResult<SocketAddr>>,
    },
    /// Outbound message
    Send {
        message: Message,
        respond_to: oneshot::Sender<NetworkResult<()>>,
    },
    /// A read loop hit EOF or an error
    LinkFailed { link_id: LinkId, reason: String },
    /// User asked to drop the link
    Disconnect {
        respond_to: oneshot::Sender<NetworkResult<()>>,
    },
    /// Snapshot request
    Status {
        respond_to: oneshot::Sender<SessionStatus>,
    },
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,
    /// Time spent in the current state
    pub time_in_state: Duration,
    /// Links established since the session started
    pub links_established: u64,
    /// Details of the current link, if any
    pub link: Option<LinkStatus>,
    /// Whether an outbound dial is in flight
    pub dialing: bool,
}

/// Details of the active link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatus {
    /// Link identifier
    pub id: LinkId,
    /// Remote socket address
    pub remote: SocketAddr,
    /// Who initiated the link
    pub origin: LinkOrigin,
    /// Time since the link was established
    pub uptime: Duration,
    /// Traffic counters
    pub stats: LinkStats,
}

/// Cloneable handle for talking to the session actor
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn from_parts(
        commands: mpsc::Sender<SessionCommand>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self { commands, state }
    }

    /// Current state as last published by the actor
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns true if a peer link exists
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns a receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Dials `peer` and installs the link on success
    ///
    /// Returns the remote socket address of the new link.
    pub async fn connect(&self, peer: PeerAddress) -> NetworkResult<SocketAddr> {
        let (respond_to, rx) = oneshot::channel();
        self.request(SessionCommand::Dial { peer, respond_to }, rx)
            .await?
    }

    /// Sends one message over the current link
    pub async fn send(&self, message: Message) -> NetworkResult<()> {
        let (respond_to, rx) = oneshot::channel();
        self.request(SessionCommand::Send { message, respond_to }, rx)
            .await?
    }

    /// Sends chat text
    pub async fn send_text(&self, text: impl Into<String>) -> NetworkResult<()> {
        self.send(Message::Text(text.into())).await
    }

    /// Drops the current link
    pub async fn disconnect(&self) -> NetworkResult<()> {
        let (respond_to, rx) = oneshot::channel();
        self.request(SessionCommand::Disconnect { respond_to }, rx)
            .await?
    }

    /// Returns a snapshot of the session
    pub async fn status(&self) -> NetworkResult<SessionStatus> {
        let (respond_to, rx) = oneshot::channel();
        self.request(SessionCommand::Status { respond_to }, rx).await
    }

    /// Hands an inbound stream to the actor without waiting
    ///
    /// Returns false once the actor has stopped. If the command queue is
    /// full the stream is closed.
    pub fn offer(&self, stream: TcpStream, remote: SocketAddr) -> bool {
        match self
            .commands
            .try_send(SessionCommand::Accept { stream, remote })
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Session busy, closing inbound connection from {}", remote);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    async fn request<T>(
        &self,
        command: SessionCommand,
        rx: oneshot::Receiver<T>,
    ) -> NetworkResult<T> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NetworkError::SessionClosed)?;
        rx.await.map_err(|_| NetworkError::SessionClosed)
    }
}

/// Spawns the session actor
///
/// Inbound clipboard payloads are forwarded to `clipboard`. The actor runs
/// until `shutdown` flips to true (or its sender is dropped).
pub fn spawn_session(
    connect_timeout: Duration,
    sink: Arc<dyn EventSink>,
    clipboard: mpsc::Sender<String>,
    shutdown: watch::Receiver<bool>,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    let actor = SessionActor {
        machine: SessionStateMachine::new(),
        link: None,
        next_link_id: 1,
        pending_dial: None,
        next_dial_id: 1,
        connect_timeout,
        sink: Arc::clone(&sink),
        link_ctx: LinkContext {
            router: InboundRouter::new(Arc::clone(&sink), clipboard),
            sink,
            commands: commands_tx.clone(),
            shutdown: shutdown.clone(),
        },
        state_tx,
    };

    let task = tokio::spawn(actor.run(commands_rx, shutdown));
    (SessionHandle::from_parts(commands_tx, state_rx), task)
}

struct SessionActor {
    machine: SessionStateMachine,
    link: Option<PeerLink>,
    next_link_id: LinkId,
    pending_dial: Option<u64>,
    next_dial_id: u64,
    connect_timeout: Duration,
    sink: Arc<dyn EventSink>,
    link_ctx: LinkContext,
    state_tx: watch::Sender<SessionState>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Session started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        self.teardown("session shutting down").await;
        info!("Session stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Accept { stream, remote } => self.on_accept(stream, remote),
            SessionCommand::Dial { peer, respond_to } => self.on_dial(peer, respond_to),
            SessionCommand::DialCompleted {
                dial_id,
                peer,
                result,
                respond_to,
            } => self.on_dial_completed(dial_id, peer, result, respond_to),
            SessionCommand::Send {
                message,
                respond_to,
            } => self.on_send(message, respond_to),
            SessionCommand::LinkFailed { link_id, reason } => {
                if self.link.as_ref().map(PeerLink::id) == Some(link_id) {
                    self.teardown(&reason).await;
                } else {
                    debug!("Ignoring failure report for stale link {}: {}", link_id, reason);
                }
            }
            SessionCommand::Disconnect { respond_to } => {
                let result = if self.link.is_some() {
                    self.teardown("closed locally").await;
                    Ok(())
                } else {
                    self.sink.notify(status::NOT_CONNECTED);
                    Err(NetworkError::NotConnected)
                };
                let _ = respond_to.send(result);
            }
            SessionCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    fn on_accept(&mut self, stream: TcpStream, remote: SocketAddr) {
        if let Some(link) = &self.link {
            info!(
                "Closing inbound connection from {}: already linked to {}",
                remote,
                link.remote()
            );
            drop(stream);
            return;
        }

        self.install_link(stream, remote, LinkOrigin::Accepted);
        self.sink.notify(&status::accepted(remote));
    }

    fn on_dial(&mut self, peer: PeerAddress, respond_to: oneshot::Sender<NetworkResult<SocketAddr>>) {
        if self.link.is_some() {
            self.sink.notify(status::ALREADY_CONNECTED);
            let _ = respond_to.send(Err(NetworkError::AlreadyConnected));
            return;
        }

        if self.pending_dial.is_some() {
            let err = NetworkError::DialInProgress;
            self.sink.notify(&status::connect_failed(&err));
            let _ = respond_to.send(Err(err));
            return;
        }

        let dial_id = self.next_dial_id;
        self.next_dial_id += 1;
        self.pending_dial = Some(dial_id);

        info!("Connecting to {}", peer);

        let commands = self.link_ctx.commands.clone();
        let timeout = self.connect_timeout;
        tokio::spawn(async move {
            let result = network::dial(&peer, timeout).await;
            let completed = SessionCommand::DialCompleted {
                dial_id,
                peer,
                result,
                respond_to,
            };
            if commands.send(completed).await.is_err() {
                debug!("Session gone before dial {} completed", dial_id);
            }
        });
    }

    fn on_dial_completed(
        &mut self,
        dial_id: u64,
        peer: PeerAddress,
        result: NetworkResult<TcpStream>,
        respond_to: oneshot::Sender<NetworkResult<SocketAddr>>,
    ) {
        if self.pending_dial == Some(dial_id) {
            self.pending_dial = None;
        }

        let reply = match result {
            Ok(stream) if self.link.is_some() => {
                info!("Discarding dialed connection to {}: link already established", peer);
                drop(stream);
                self.sink.notify(status::ALREADY_CONNECTED);
                Err(NetworkError::AlreadyConnected)
            }
            Ok(stream) => match stream.peer_addr() {
                Ok(remote) => {
                    self.install_link(stream, remote, LinkOrigin::Dialed);
                    self.sink.notify(&status::dialed(&peer));
                    Ok(remote)
                }
                Err(e) => {
                    let err = NetworkError::Connect {
                        addr: peer.to_string(),
                        reason: e.to_string(),
                    };
                    self.sink.notify(&status::connect_failed(e));
                    Err(err)
                }
            },
            Err(err) => {
                warn!("Dial to {} failed: {}", peer, err);
                let reason = match &err {
                    NetworkError::Connect { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.sink.notify(&status::connect_failed(reason));
                Err(err)
            }
        };

        let _ = respond_to.send(reply);
    }

    fn on_send(&mut self, message: Message, respond_to: oneshot::Sender<NetworkResult<()>>) {
        let Some(link) = self.link.as_ref() else {
            if !message.is_clipboard() {
                self.sink.notify(status::NOT_CONNECTED);
            }
            let _ = respond_to.send(Err(NetworkError::NotConnected));
            return;
        };

        // The write loop answers once the bytes are out
        link.send(message, respond_to);
    }

    fn install_link(&mut self, stream: TcpStream, remote: SocketAddr, origin: LinkOrigin) {
        let id = self.next_link_id;
        self.next_link_id += 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", remote, e);
        }

        let link = PeerLink::open(id, stream, remote, origin, self.link_ctx.clone());
        self.link = Some(link);
        self.set_state(SessionState::Connected);

        info!("Link {} established with {} ({})", id, remote, origin);
    }

    /// Tears down the current link, if any. Safe to call repeatedly.
    async fn teardown(&mut self, reason: &str) {
        let Some(link) = self.link.take() else {
            return;
        };

        let (id, remote) = (link.id(), link.remote());
        link.close().await;
        self.set_state(SessionState::Idle);
        self.sink.notify(status::DISCONNECTED);

        info!("Link {} with {} closed: {}", id, remote, reason);
    }

    fn set_state(&mut self, state: SessionState) {
        if let Err(e) = self.machine.transition(state) {
            warn!("{}", e);
        }
        self.state_tx.send_replace(state);
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.machine.current(),
            time_in_state: self.machine.time_in_state(),
            links_established: self.machine.links_established(),
            link: self.link.as_ref().map(|link| LinkStatus {
                id: link.id(),
                remote: link.remote(),
                origin: link.origin(),
                uptime: link.uptime(),
                stats: link.stats(),
            }),
            dialing: self.pending_dial.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelSink;
    use crate::network::PeerListener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Fixture {
        handle: SessionHandle,
        events: mpsc::UnboundedReceiver<String>,
        clipboard: mpsc::Receiver<String>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    }

    fn fixture() -> Fixture {
        let (sink, events) = ChannelSink::new();
        let (clip_tx, clipboard) = mpsc::channel(8);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (handle, task) =
            spawn_session(Duration::from_secs(2), Arc::new(sink), clip_tx, shutdown_rx);
        Fixture {
            handle,
            events,
            clipboard,
            shutdown,
            task,
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn connected_pair(listener: &TcpListener) -> (TcpStream, (TcpStream, SocketAddr)) {
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap())
    }

    #[tokio::test]
    async fn test_send_while_idle_is_rejected() {
        let mut f = fixture();

        let result = f.handle.send_text("hello").await;
        assert!(matches!(result, Err(NetworkError::NotConnected)));
        assert_eq!(next_event(&mut f.events).await, "Not connected to a peer");
        assert_eq!(f.handle.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_clipboard_send_while_idle_is_silent() {
        let mut f = fixture();

        let result = f
            .handle
            .send(Message::ClipboardUpdate("x".to_string()))
            .await;
        assert!(matches!(result, Err(NetworkError::NotConnected)));
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_accept_then_receive_text() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut remote, (stream, addr)) = connected_pair(&listener).await;

        assert!(f.handle.offer(stream, addr));
        assert_eq!(next_event(&mut f.events).await, format!("Connected with {}", addr));
        assert!(f.handle.is_connected());

        remote.write_all(b"hi").await.unwrap();
        assert_eq!(next_event(&mut f.events).await, "Peer: hi");

        remote.write_all(b"CLIPBOARD:pasted").await.unwrap();
        assert_eq!(f.clipboard.recv().await.as_deref(), Some("pasted"));
    }

    #[tokio::test]
    async fn test_second_inbound_is_closed() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (_first_remote, (first, first_addr)) = connected_pair(&listener).await;
        f.handle.offer(first, first_addr);
        next_event(&mut f.events).await;

        let (mut second_remote, (second, second_addr)) = connected_pair(&listener).await;
        f.handle.offer(second, second_addr);

        // The intruder sees EOF
        let mut buf = [0u8; 4];
        let n = tokio::time::timeout(Duration::from_secs(2), second_remote.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);

        let status = f.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Connected);
        assert_eq!(status.link.unwrap().remote, first_addr);
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dial_while_connected_is_rejected() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_remote, (stream, addr)) = connected_pair(&listener).await;
        f.handle.offer(stream, addr);
        next_event(&mut f.events).await;

        // Nothing listens here; the dial must be refused before any network call
        let result = f.handle.connect(PeerAddress::new("203.0.113.1", 9)).await;
        assert!(matches!(result, Err(NetworkError::AlreadyConnected)));
        assert_eq!(next_event(&mut f.events).await, "Already connected to a peer");
    }

    #[tokio::test]
    async fn test_dial_success_and_send() {
        let mut f = fixture();
        let listener = PeerListener::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().port();

        let (connected, accepted) = tokio::join!(
            f.handle.connect(PeerAddress::new("127.0.0.1", port)),
            listener.accept()
        );
        connected.unwrap();
        let (mut remote, _) = accepted.unwrap();

        assert_eq!(
            next_event(&mut f.events).await,
            format!("Connected to peer at 127.0.0.1:{}", port)
        );

        f.handle.send_text("hello").await.unwrap();
        assert_eq!(next_event(&mut f.events).await, "You: hello");

        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        let status = f.handle.status().await.unwrap();
        let link = status.link.unwrap();
        assert_eq!(link.origin, LinkOrigin::Dialed);
        assert_eq!(link.stats.messages_sent, 1);
    }

    #[tokio::test]
    async fn test_dial_failure_stays_idle() {
        let mut f = fixture();
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = f.handle.connect(PeerAddress::new("127.0.0.1", port)).await;
        assert!(matches!(result, Err(NetworkError::Connect { .. })));
        assert!(next_event(&mut f.events).await.starts_with("Failed to connect: "));
        assert_eq!(f.handle.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_peer_close_transitions_to_idle_once() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (remote, (stream, addr)) = connected_pair(&listener).await;
        f.handle.offer(stream, addr);
        next_event(&mut f.events).await;

        let mut state = f.handle.watch_state();
        drop(remote);

        // Race a send against the read loop noticing EOF
        let _ = f.handle.send_text("late").await;

        tokio::time::timeout(Duration::from_secs(2), state.wait_for(|s| *s == SessionState::Idle))
            .await
            .unwrap()
            .unwrap();

        // Give any duplicate report a chance to surface
        let status = f.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Idle);

        let mut disconnects = 0;
        while let Ok(line) = f.events.try_recv() {
            if line == "Disconnected from peer" {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn test_explicit_disconnect_allows_reconnect() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (_r1, (s1, a1)) = connected_pair(&listener).await;
        f.handle.offer(s1, a1);
        next_event(&mut f.events).await;

        f.handle.disconnect().await.unwrap();
        assert_eq!(next_event(&mut f.events).await, "Disconnected from peer");
        assert!(matches!(
            f.handle.disconnect().await,
            Err(NetworkError::NotConnected)
        ));
        assert_eq!(next_event(&mut f.events).await, "Not connected to a peer");

        let (_r2, (s2, a2)) = connected_pair(&listener).await;
        f.handle.offer(s2, a2);
        assert_eq!(next_event(&mut f.events).await, format!("Connected with {}", a2));

        let status = f.handle.status().await.unwrap();
        assert_eq!(status.link.unwrap().id, 2);
        assert_eq!(status.links_established, 2);
    }

    #[tokio::test]
    async fn test_inbound_wins_while_dial_in_flight() {
        let mut f = fixture();
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let inbound = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_inbound_remote, (stream, addr)) = connected_pair(&inbound).await;

        // The dial is queued first, the inbound stream lands before it completes
        let (dialed, ()) = tokio::join!(
            f.handle.connect(PeerAddress::new("127.0.0.1", target_port)),
            async {
                f.handle.offer(stream, addr);
            }
        );
        assert!(matches!(dialed, Err(NetworkError::AlreadyConnected)));

        assert_eq!(next_event(&mut f.events).await, format!("Connected with {}", addr));
        assert_eq!(next_event(&mut f.events).await, "Already connected to a peer");

        // The dialed connection was closed on arrival
        let (mut dialed_remote, _) = target.accept().await.unwrap();
        let mut buf = [0u8; 4];
        let n = tokio::time::timeout(Duration::from_secs(2), dialed_remote.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);

        let status = f.handle.status().await.unwrap();
        let link = status.link.unwrap();
        assert_eq!(link.origin, LinkOrigin::Accepted);
        assert_eq!(link.remote, addr);
        assert!(!status.dialing);
    }

    #[tokio::test]
    async fn test_second_dial_is_rejected_while_first_in_flight() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (first, second) = tokio::join!(
            f.handle.connect(PeerAddress::new("127.0.0.1", port)),
            f.handle.connect(PeerAddress::new("127.0.0.1", port))
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(NetworkError::DialInProgress)));

        assert_eq!(
            next_event(&mut f.events).await,
            "Failed to connect: A connection attempt is already in progress"
        );
        assert_eq!(
            next_event(&mut f.events).await,
            format!("Connected to peer at 127.0.0.1:{}", port)
        );
        assert_eq!(f.handle.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_stalled_peer_does_not_block_session() {
        let mut f = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        // The remote end never reads
        let (_remote, (stream, addr)) = connected_pair(&listener).await;
        f.handle.offer(stream, addr);
        next_event(&mut f.events).await;

        let sender = f.handle.clone();
        let blocked = tokio::spawn(async move {
            sender.send_text("x".repeat(64 * 1024 * 1024)).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = tokio::time::timeout(Duration::from_secs(2), f.handle.status())
            .await
            .expect("status stalled behind a blocked write")
            .unwrap();
        assert_eq!(status.state, SessionState::Connected);

        f.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), f.task)
            .await
            .expect("session did not stop")
            .unwrap();

        // The pending send is abandoned rather than left hanging
        let result = tokio::time::timeout(Duration::from_secs(2), blocked)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let f = fixture();
        f.shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), f.task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            f.handle.status().await,
            Err(NetworkError::SessionClosed)
        ));
    }
}
