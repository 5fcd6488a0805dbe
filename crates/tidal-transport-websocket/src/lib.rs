//! WebSocket transport for Tidal.
//!
//! This crate provides a [`Connector`] whose links are single WebSocket
//! connections negotiated with the `cbor` subprotocol. Each link is driven
//! by one worker task moving binary frames both ways.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tidal_transport::{Connector, Link, LinkMetrics, TransportError, TransportHealthSnapshot};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub subprotocol: String,
    pub outbound_queue_capacity: usize,
    pub inbound_queue_capacity: usize,
    pub max_payload_hint: Option<usize>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            subprotocol: "cbor".to_string(),
            outbound_queue_capacity: 1024,
            inbound_queue_capacity: 4096,
            max_payload_hint: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
    metrics: Arc<LinkMetrics>,
}

impl WebSocketConnector {
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(LinkMetrics::default()),
        }
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);
        let url = url.to_string();

        Box::pin(async move {
            metrics.record_connect_attempt();
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|err| TransportError::Handshake(err.to_string()))?;
            let protocol = HeaderValue::from_str(&config.subprotocol)
                .map_err(|err| TransportError::Handshake(err.to_string()))?;
            request.headers_mut().insert(SUBPROTOCOL_HEADER, protocol);

            let (stream, _response) = connect_async(request)
                .await
                .map_err(|err| TransportError::Refused(err.to_string()))?;
            info!(%url, "websocket link established");

            let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
            let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_capacity.max(1));
            tokio::spawn(run_link_worker(
                stream,
                config.max_payload_hint,
                metrics,
                outbound_rx,
                inbound_tx,
            ));

            Ok(Link {
                outbound: outbound_tx,
                inbound: inbound_rx,
            })
        })
    }

    fn max_payload_hint(&self) -> Option<usize> {
        self.config.max_payload_hint
    }

    fn health_snapshot(&self) -> TransportHealthSnapshot {
        self.metrics.snapshot()
    }
}

async fn run_link_worker(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    max_payload_hint: Option<usize>,
    metrics: Arc<LinkMetrics>,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    inbound_tx: mpsc::Sender<Bytes>,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            maybe_out = outbound_rx.recv() => {
                match maybe_out {
                    Some(bytes) => {
                        if let Some(hint) = max_payload_hint {
                            if bytes.len() > hint {
                                warn!(len = bytes.len(), hint, "dropping oversized outbound frame");
                                metrics.record_send_err();
                                continue;
                            }
                        }
                        if let Err(err) = write.send(Message::Binary(bytes.to_vec())).await {
                            warn!(%err, "websocket write failed");
                            metrics.record_send_err();
                            break;
                        }
                        metrics.record_send_ok();
                    }
                    None => {
                        debug!("outbound side dropped, closing websocket");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            maybe_in = read.next() => {
                match maybe_in {
                    Some(Ok(Message::Binary(data))) => {
                        metrics.record_received();
                        if inbound_tx.send(Bytes::from(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "websocket closed by remote");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "websocket read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
