//! In-memory links for tests and simulations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::connector::{Connector, Link, LinkMetrics, TransportError, TransportHealthSnapshot};

const DEFAULT_CAPACITY: usize = 256;

/// Server half of an in-memory link.
///
/// Dropping the peer (or calling [`MemoryPeer::disconnect`]) ends the link,
/// which the client observes as transport loss.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    inbound: mpsc::Receiver<Bytes>,
    outbound: mpsc::Sender<Bytes>,
}

impl MemoryPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame written by the client; `None` once the client let go.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    pub async fn send(&self, frame: impl Into<Bytes>) -> Result<(), TransportError> {
        self.outbound
            .send(frame.into())
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub fn disconnect(self) {
        debug!(url = %self.url, "memory peer disconnecting");
    }
}

/// Receives the server half of every link opened by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Returns an already-opened peer without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

/// Connector whose links are plain channel pairs.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicUsize>,
    capacity: usize,
    metrics: Arc<LinkMetrics>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryAcceptor) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            refuse: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
            metrics: Arc::new(LinkMetrics::default()),
        };
        (connector, MemoryAcceptor { peers: rx })
    }

    /// Makes the next `count` connect attempts fail with [`TransportError::Refused`].
    pub fn refuse_next(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    /// Connect attempts seen so far, refused ones included.
    pub fn connect_attempts(&self) -> u64 {
        self.metrics.snapshot().connect_attempts
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.metrics.record_connect_attempt();
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            debug!(url, "memory connector refusing connect");
            return future::ready(Err(TransportError::Refused(url.to_string()))).boxed();
        }

        let (client_tx, server_rx) = mpsc::channel(self.capacity);
        let (server_tx, client_rx) = mpsc::channel(self.capacity);
        let peer = MemoryPeer {
            url: url.to_string(),
            inbound: server_rx,
            outbound: server_tx,
        };
        let result = match self.peers.send(peer) {
            Ok(()) => Ok(Link {
                outbound: client_tx,
                inbound: client_rx,
            }),
            Err(_) => Err(TransportError::Refused(format!("{url}: acceptor dropped"))),
        };
        future::ready(result).boxed()
    }

    fn health_snapshot(&self) -> TransportHealthSnapshot {
        self.metrics.snapshot()
    }
}
