use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

/// Coarse per-connector transport health counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportHealthSnapshot {
    pub connect_attempts: u64,
    pub outbound_send_ok: u64,
    pub outbound_send_err: u64,
    pub inbound_received: u64,
}

/// Shared atomic counters behind [`TransportHealthSnapshot`].
#[derive(Debug, Default)]
pub struct LinkMetrics {
    connect_attempts: AtomicU64,
    outbound_send_ok: AtomicU64,
    outbound_send_err: AtomicU64,
    inbound_received: AtomicU64,
}

impl LinkMetrics {
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_ok(&self) {
        self.outbound_send_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_err(&self) {
        self.outbound_send_err.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.inbound_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportHealthSnapshot {
        TransportHealthSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            outbound_send_ok: self.outbound_send_ok.load(Ordering::Relaxed),
            outbound_send_err: self.outbound_send_err.load(Ordering::Relaxed),
            inbound_received: self.inbound_received.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote end could not be reached or refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The connection was reached but the protocol handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("link is closed")]
    Closed,
    #[error("payload of {len} bytes exceeds max payload hint ({hint} bytes)")]
    PayloadTooLarge { len: usize, hint: usize },
}

/// One established, bidirectional binary-frame channel.
///
/// Each outbound item is sent as exactly one frame. The inbound receiver
/// yielding `None` means the link is gone; dropping `outbound` asks the
/// transport to close it.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::Sender<Bytes>,
    pub inbound: mpsc::Receiver<Bytes>,
}

/// Opens links to an endpoint URL.
pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>>;

    /// Optional maximum frame size accepted by the transport.
    fn max_payload_hint(&self) -> Option<usize> {
        None
    }

    /// Best-effort transport health counters.
    fn health_snapshot(&self) -> TransportHealthSnapshot {
        TransportHealthSnapshot::default()
    }
}
