//! A single peer link with its read and write loops
//!
//! Both halves of the socket live in their own tasks. The read loop routes
//! decoded messages; the write loop drains a bounded queue filled by the
//! session actor, so a peer that stops reading stalls only its own writer.
//! Either loop reports the first I/O failure back to the actor, tagged with
//! the link id.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::events::{status, EventSink};
use crate::network::{read_message, Message, READ_UNIT};
use crate::session::actor::SessionCommand;

/// Outbound messages a link buffers before sends are refused
const SEND_QUEUE: usize = 32;

/// Identifier of one link; never reused within a process
pub type LinkId = u64;

/// How the link came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    /// The peer dialed us
    Accepted,
    /// We dialed the peer
    Dialed,
}

impl std::fmt::Display for LinkOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkOrigin::Accepted => write!(f, "Accepted"),
            LinkOrigin::Dialed => write!(f, "Dialed"),
        }
    }
}

/// Traffic statistics for one link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
}

/// Counters shared between the write loop and the read loop
#[derive(Debug, Default)]
struct LinkCounters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl LinkCounters {
    fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LinkStats {
        LinkStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

/// Delivers inbound messages: text to the event sink, clipboard payloads
/// to the clipboard bridge
#[derive(Clone)]
pub(crate) struct InboundRouter {
    sink: Arc<dyn EventSink>,
    clipboard: mpsc::Sender<String>,
}

impl InboundRouter {
    pub(crate) fn new(sink: Arc<dyn EventSink>, clipboard: mpsc::Sender<String>) -> Self {
        Self { sink, clipboard }
    }

    async fn route(&self, message: Message) {
        match message {
            Message::Text(text) => self.sink.notify(&status::peer_text(&text)),
            Message::ClipboardUpdate(content) => {
                if self.clipboard.send(content).await.is_err() {
                    debug!("Clipboard bridge gone, dropping inbound clipboard update");
                }
            }
        }
    }
}

/// Everything the link loops need besides the socket
#[derive(Clone)]
pub(crate) struct LinkContext {
    pub(crate) router: InboundRouter,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) commands: mpsc::Sender<SessionCommand>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

struct Outbound {
    message: Message,
    respond_to: oneshot::Sender<NetworkResult<()>>,
}

fn sent_line(message: &Message) -> String {
    match message {
        Message::Text(text) => status::own_text(text),
        Message::ClipboardUpdate(content) => status::clipboard_sent(content),
    }
}

fn failed_line(message: &Message) -> &'static str {
    if message.is_clipboard() {
        status::CLIPBOARD_SEND_FAILED
    } else {
        status::SEND_FAILED
    }
}

/// The one active connection to a remote party
pub(crate) struct PeerLink {
    id: LinkId,
    remote: SocketAddr,
    origin: LinkOrigin,
    established_at: Instant,
    outbound: mpsc::Sender<Outbound>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    counters: Arc<LinkCounters>,
    sink: Arc<dyn EventSink>,
}

impl PeerLink {
    /// Splits the stream and starts both loops
    pub(crate) fn open(
        id: LinkId,
        stream: TcpStream,
        remote: SocketAddr,
        origin: LinkOrigin,
        ctx: LinkContext,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let counters = Arc::new(LinkCounters::default());
        let (outbound, queue) = mpsc::channel(SEND_QUEUE);
        let sink = Arc::clone(&ctx.sink);

        let writer = tokio::spawn(write_loop(
            id,
            remote,
            write_half,
            queue,
            Arc::clone(&counters),
            ctx.clone(),
        ));
        let reader = tokio::spawn(read_loop(
            id,
            remote,
            read_half,
            Arc::clone(&counters),
            ctx,
        ));

        Self {
            id,
            remote,
            origin,
            established_at: Instant::now(),
            outbound,
            reader,
            writer,
            counters,
            sink,
        }
    }

    pub(crate) fn id(&self) -> LinkId {
        self.id
    }

    pub(crate) fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub(crate) fn origin(&self) -> LinkOrigin {
        self.origin
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.established_at.elapsed()
    }

    pub(crate) fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Queues one message for the write loop without waiting
    ///
    /// `respond_to` is answered once the bytes are written. If the queue is
    /// full or the writer has stopped it is answered immediately with a
    /// link error.
    pub(crate) fn send(&self, message: Message, respond_to: oneshot::Sender<NetworkResult<()>>) {
        let (item, reason) = match self.outbound.try_send(Outbound {
            message,
            respond_to,
        }) {
            Ok(()) => return,
            Err(TrySendError::Full(item)) => (item, "send queue full"),
            Err(TrySendError::Closed(item)) => (item, "link writer stopped"),
        };

        warn!("Cannot send to {}: {}", self.remote, reason);
        self.sink.notify(failed_line(&item.message));
        let _ = item.respond_to.send(Err(NetworkError::Link {
            remote: self.remote,
            reason: reason.to_string(),
        }));
    }

    /// Stops both loops and closes the socket
    ///
    /// Messages still queued are dropped. Dropping the write half sends the
    /// peer an orderly shutdown.
    pub(crate) async fn close(self) {
        self.reader.abort();
        self.writer.abort();
        let _ = self.reader.await;
        let _ = self.writer.await;
        debug!("Link {} to {} closed", self.id, self.remote);
    }
}

/// Resolves once shutdown is requested or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn read_loop(
    id: LinkId,
    remote: SocketAddr,
    mut reader: OwnedReadHalf,
    counters: Arc<LinkCounters>,
    mut ctx: LinkContext,
) {
    let mut buf = [0u8; READ_UNIT];
    debug!("Read loop for link {} ({}) started", id, remote);

    let reason = loop {
        tokio::select! {
            _ = shutdown_requested(&mut ctx.shutdown) => {
                debug!("Read loop for link {} stopped by shutdown", id);
                return;
            }
            result = read_message(&mut reader, &mut buf) => match result {
                Ok(Some((message, n))) => {
                    counters.record_received(n);
                    debug!("Link {} received {} bytes", id, n);
                    ctx.router.route(message).await;
                }
                Ok(None) => break "peer closed the connection".to_string(),
                Err(e) => {
                    warn!("Read from {} failed: {}", remote, e);
                    break e.to_string();
                }
            },
        }
    };

    report_failure(&ctx, id, reason).await;
}

async fn write_loop(
    id: LinkId,
    remote: SocketAddr,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Outbound>,
    counters: Arc<LinkCounters>,
    mut ctx: LinkContext,
) {
    loop {
        let Outbound {
            message,
            respond_to,
        } = tokio::select! {
            _ = shutdown_requested(&mut ctx.shutdown) => return,
            item = queue.recv() => match item {
                Some(item) => item,
                None => return,
            },
        };

        let bytes = message.encode();
        let written = tokio::select! {
            _ = shutdown_requested(&mut ctx.shutdown) => return,
            result = writer.write_all(&bytes) => result,
        };

        match written {
            Ok(()) => {
                counters.record_sent(bytes.len());
                ctx.sink.notify(&sent_line(&message));
                let _ = respond_to.send(Ok(()));
            }
            Err(e) => {
                warn!("Send to {} failed: {}", remote, e);
                ctx.sink.notify(failed_line(&message));
                let _ = respond_to.send(Err(NetworkError::Link {
                    remote,
                    reason: e.to_string(),
                }));
                report_failure(&ctx, id, e.to_string()).await;
                return;
            }
        }
    }
}

async fn report_failure(ctx: &LinkContext, link_id: LinkId, reason: String) {
    if ctx
        .commands
        .send(SessionCommand::LinkFailed { link_id, reason })
        .await
        .is_err()
    {
        debug!("Session gone before link {} failure could be reported", link_id);
    }
}
