//! TCP transport: the listening socket and outbound dials
//!
//! The transport knows nothing about peers or sessions. The accept loop
//! hands every inbound stream to the session, which decides whether to keep
//! or close it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::PeerAddress;
use crate::error::{NetworkError, NetworkResult};

/// Backlog for the listening socket
const LISTEN_BACKLOG: u32 = 1;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Listening socket for inbound peers
pub struct PeerListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl PeerListener {
    /// Binds and listens on `host:port`
    ///
    /// The address-reuse option is set so a restarted process can bind
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Bind` if the host does not resolve or the
    /// address is in use.
    pub async fn bind(host: &str, port: u16) -> NetworkResult<Self> {
        let display = format!("{}:{}", host, port);
        let bind_error = |source: std::io::Error| NetworkError::Bind {
            addr: display.clone(),
            source,
        };

        let addr = lookup_host((host, port))
            .await
            .map_err(&bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host did not resolve to any address",
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(&bind_error)?;

        socket.set_reuseaddr(true).map_err(&bind_error)?;
        socket.bind(addr).map_err(&bind_error)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(&bind_error)?;
        let local_addr = listener.local_addr().map_err(&bind_error)?;

        info!("Listening for peers on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next inbound connection
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    /// Runs the accept loop until shutdown
    ///
    /// Every accepted stream is passed to `offer`. Accept errors are logged
    /// and the loop keeps going.
    pub async fn run<F>(self, mut shutdown: watch::Receiver<bool>, mut offer: F)
    where
        F: FnMut(TcpStream, SocketAddr) -> bool,
    {
        debug!("Accept loop started on {}", self.local_addr);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = self.accept() => match accepted {
                    Ok((stream, remote)) => {
                        debug!("Accepted TCP connection from {}", remote);
                        if !offer(stream, remote) {
                            debug!("Session no longer accepting connections");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }

        info!("Accept loop on {} stopped", self.local_addr);
    }
}

/// Opens an outbound connection to `peer`
///
/// # Errors
///
/// Returns `NetworkError::Timeout` when the dial exceeds `timeout` and
/// `NetworkError::Connect` for any other failure.
pub async fn dial(peer: &PeerAddress, timeout: Duration) -> NetworkResult<TcpStream> {
    debug!("Dialing {}", peer);

    match tokio::time::timeout(timeout, TcpStream::connect((peer.host.as_str(), peer.port))).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY on link to {}: {}", peer, e);
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(NetworkError::Connect {
            addr: peer.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(NetworkError::Timeout {
            addr: peer.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = PeerListener::bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = PeerListener::bind("127.0.0.1", 0).await.unwrap();
        let port = first.local_addr().port();

        let second = PeerListener::bind("127.0.0.1", port).await;
        assert!(matches!(second, Err(NetworkError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_bind_unresolvable_host() {
        let result = PeerListener::bind("no-such-host.invalid", 0).await;
        assert!(matches!(result, Err(NetworkError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_dial_and_accept() {
        let listener = PeerListener::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().port();

        let peer = PeerAddress::new("127.0.0.1", port);
        let (dialed, accepted) = tokio::join!(dial(&peer, Duration::from_secs(2)), listener.accept());

        let dialed = dialed.unwrap();
        let (_, remote) = accepted.unwrap();
        assert_eq!(dialed.local_addr().unwrap(), remote);
    }

    #[tokio::test]
    async fn test_dial_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = PeerListener::bind("127.0.0.1", 0).await.unwrap();
            listener.local_addr().port()
        };

        let result = dial(&PeerAddress::new("127.0.0.1", port), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(NetworkError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_accept_loop_stops_on_shutdown() {
        let listener = PeerListener::bind("127.0.0.1", 0).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(listener.run(shutdown_rx, |_, _| true));
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
