//! Connection-style adapter (persistent sockets).
//!
//! Sockets already target the local gateway when they are created, so the
//! target is not classified. Payload bytes pass through untouched in both
//! directions; the adapter only logs lifecycle events and message sizes.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio_util::codec::{BytesCodec, Framed};
use tracing::{debug, info, warn};

/// Opens raw connections.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    type Conn: SocketConnection;

    async fn connect(&self, url: &str) -> io::Result<Self::Conn>;
}

/// A bidirectional byte-message connection.
#[async_trait]
pub trait SocketConnection: Send {
    async fn send(&mut self, payload: Bytes) -> io::Result<()>;

    /// Next inbound message; `None` once the peer has closed.
    async fn recv(&mut self) -> Option<io::Result<Bytes>>;

    async fn close(&mut self) -> io::Result<()>;
}

/// Wraps a connector and hands out observed connections.
pub struct SocketAdapter<C> {
    connector: C,
    next_id: AtomicU64,
}

impl<C: SocketConnector> SocketAdapter<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn connect(&self, url: &str) -> io::Result<ObservedSocket<C::Conn>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(id, url, "socket connecting");
        match self.connector.connect(url).await {
            Ok(inner) => {
                info!(id, url, "socket open");
                Ok(ObservedSocket {
                    id,
                    url: url.to_string(),
                    inner,
                    sent: 0,
                    received: 0,
                })
            }
            Err(e) => {
                warn!(id, url, error = %e, "socket error");
                Err(e)
            }
        }
    }
}

/// A connection whose traffic is logged but never altered.
pub struct ObservedSocket<S> {
    id: u64,
    url: String,
    inner: S,
    sent: u64,
    received: u64,
}

impl<S: SocketConnection> ObservedSocket<S> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Messages sent and received so far.
    pub fn counts(&self) -> (u64, u64) {
        (self.sent, self.received)
    }

    pub async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        debug!(id = self.id, bytes = payload.len(), "socket send");
        self.sent += 1;
        self.inner.send(payload).await.inspect_err(|e| {
            warn!(id = self.id, error = %e, "socket error");
        })
    }

    pub async fn recv(&mut self) -> Option<io::Result<Bytes>> {
        match self.inner.recv().await {
            Some(Ok(payload)) => {
                debug!(id = self.id, bytes = payload.len(), "socket message");
                self.received += 1;
                Some(Ok(payload))
            }
            Some(Err(e)) => {
                warn!(id = self.id, error = %e, "socket error");
                Some(Err(e))
            }
            None => {
                info!(id = self.id, url = %self.url, "socket closed by peer");
                None
            }
        }
    }

    pub async fn close(&mut self) -> io::Result<()> {
        info!(
            id = self.id,
            url = %self.url,
            sent = self.sent,
            received = self.received,
            "socket closing"
        );
        self.inner.close().await
    }
}

/// Plain TCP connector for `tcp://` or bare `host:port` targets.
///
/// No WebSocket handshake is performed, so `ws://` and `wss://` targets are
/// refused with [`io::ErrorKind::Unsupported`] rather than fed raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

pub struct TcpConnection {
    framed: Framed<TcpStream, BytesCodec>,
}

fn socket_authority(url: &str) -> io::Result<&str> {
    let rest = match url.split_once("://") {
        None => url,
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("tcp") => rest,
        Some((scheme, _)) => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("socket scheme `{scheme}` is not supported by the tcp connector: {url}"),
            ));
        }
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("socket url has no host: {url}"),
        ));
    }
    Ok(authority)
}

#[async_trait]
impl SocketConnector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, url: &str) -> io::Result<TcpConnection> {
        let stream = TcpStream::connect(socket_authority(url)?).await?;
        stream.set_nodelay(true)?;
        Ok(TcpConnection {
            framed: Framed::new(stream, BytesCodec::new()),
        })
    }
}

#[async_trait]
impl SocketConnection for TcpConnection {
    async fn send(&mut self, payload: Bytes) -> io::Result<()> {
        SinkExt::<Bytes>::send(&mut self.framed, payload).await
    }

    async fn recv(&mut self) -> Option<io::Result<Bytes>> {
        self.framed.next().await.map(|r| r.map(|b| b.freeze()))
    }

    async fn close(&mut self) -> io::Result<()> {
        SinkExt::<Bytes>::close(&mut self.framed).await
    }
}
