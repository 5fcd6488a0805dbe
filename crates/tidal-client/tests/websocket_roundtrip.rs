use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tidal_client::{Client, ClientConfig, ConnectionStatus, ReconnectConfig, Value};
use tidal_core::{decode_value, encode_value};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const PROTOCOL_HEADER: &str = "sec-websocket-protocol";

/// Answers `count` requests (`version` with a version string, anything
/// else with null), then closes the socket.
async fn rpc_server(count: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            if let Some(proto) = req.headers().get(PROTOCOL_HEADER) {
                resp.headers_mut().insert(PROTOCOL_HEADER, proto.clone());
            }
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .expect("handshake");
        let mut answered = 0;
        while answered < count {
            let data = match ws.next().await {
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(_)) => continue,
                _ => return,
            };
            let request = decode_value(&data).expect("decode request");
            let id = request.get("id").cloned().expect("id");
            let result = match request.get("method").and_then(Value::as_str) {
                Some("version") => Value::from("surrealdb-2.0.0"),
                _ => Value::Null,
            };
            let reply = Value::map([("id", id), ("result", result)]);
            let bytes = encode_value(&reply).expect("encode reply");
            ws.send(Message::Binary(bytes.to_vec())).await.expect("reply");
            answered += 1;
        }
        let _ = ws.close(None).await;
    });
    format!("ws://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_talks_cbor_over_websocket() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let url = rpc_server(2).await;
    let config = ClientConfig {
        reconnect: ReconnectConfig::disabled(),
        ..ClientConfig::default()
    };
    let client = Client::connect_websocket(url, config)
        .await
        .expect("connect");

    client.ping().await.expect("ping");
    assert_eq!(
        client.version().await.expect("version"),
        "surrealdb-2.0.0"
    );
    assert_eq!(client.transport_health().connect_attempts, 1);

    // The server hangs up after two answers.
    let mut status = client.status_watch();
    timeout(
        Duration::from_secs(5),
        status.wait_for(|status| *status == ConnectionStatus::Disconnected),
    )
    .await
    .expect("in time")
    .expect("engine alive");
}
