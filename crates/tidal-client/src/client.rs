use std::fmt;
use std::sync::Arc;

use tidal_codec::Value;
use tidal_core::Uuid;
use tidal_transport::{Connector, TransportHealthSnapshot};
use tidal_transport_websocket::{WebSocketConfig, WebSocketConnector};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::config::ClientConfig;
use crate::engine::{Command, Engine, LiveQuery, Reply};
use crate::error::{ClientError, DisconnectReason};
use crate::live::LiveStream;
use crate::rpc::RpcRequest;
use crate::state::{ConnectionState, ConnectionStatus};

/// Handle onto a running connection engine. Clones share the engine.
#[derive(Clone)]
pub struct Client {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Opens a link through `connector`, spawns the engine task and applies
    /// the namespace, database and token from `config`.
    pub async fn connect(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let (commands, command_rx) = mpsc::channel(config.outbound_queue_capacity);
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);
        let mut engine = Engine::new(url.into(), connector.clone(), &config, command_rx, status_tx);
        engine.open().await?;
        tokio::spawn(engine.run());

        let client = Self {
            commands,
            status,
            connector,
        };
        if config.namespace.is_some() || config.database.is_some() {
            client
                .use_ns_db(config.namespace.as_deref(), config.database.as_deref())
                .await?;
        }
        if let Some(token) = &config.token {
            client.authenticate(token).await?;
        }
        Ok(client)
    }

    /// [`Client::connect`] over a WebSocket speaking the `cbor` subprotocol.
    pub async fn connect_websocket(
        url: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let connector = Arc::new(WebSocketConnector::new(WebSocketConfig::default()));
        Self::connect(url, connector, config).await
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Resolves once the engine is connected, or fails if it has given up.
    pub async fn wait_connected(&self) -> Result<(), ClientError> {
        let mut status = self.status.clone();
        loop {
            let current = *status.borrow_and_update();
            match current {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                    return Err(ClientError::ConnectionUnavailable)
                }
                ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {}
            }
            status
                .changed()
                .await
                .map_err(|_| ClientError::ConnectionUnavailable)?;
        }
    }

    pub fn transport_health(&self) -> TransportHealthSnapshot {
        self.connector.health_snapshot()
    }

    /// Snapshot of the session state the engine would restore.
    pub async fn connection_state(&self) -> Result<ConnectionState, ClientError> {
        let (respond, state) = oneshot::channel();
        self.send(Command::State { respond }).await?;
        state.await.map_err(|_| ClientError::ConnectionUnavailable)
    }

    pub async fn rpc(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Value, ClientError> {
        self.call(RpcRequest::new(method, params)).await
    }

    /// Sends `request` and waits for its reply. Calls interrupted by a
    /// reconnect are sent again on the restored link.
    pub async fn call(&self, request: RpcRequest) -> Result<Value, ClientError> {
        loop {
            let (respond, dispatched) = oneshot::channel();
            self.send(Command::Rpc {
                request: request.clone(),
                respond,
            })
            .await?;
            let reply = dispatched
                .await
                .map_err(|_| ClientError::ConnectionUnavailable)??;
            match reply.await {
                Ok(Reply::Response(response)) => return response.map_err(ClientError::from),
                Ok(Reply::Retry) => {
                    debug!(method = %request.method, "re-issuing call after reconnect");
                }
                Ok(Reply::Failed(err)) => return Err(err),
                Err(_) => return Err(ClientError::Disconnected(DisconnectReason::Closed)),
            }
        }
    }

    /// Starts a live query that the engine restarts after every reconnect.
    pub async fn live(&self, what: impl Into<Value>, diff: bool) -> Result<LiveStream, ClientError> {
        let what = what.into();
        let id = self.rpc("live", vec![what.clone(), Value::Bool(diff)]).await?;
        let id = Uuid::try_from(&id)
            .map_err(|err| ClientError::Protocol(format!("live query id: {err}")))?;
        self.subscribe(id, Some(LiveQuery { what, diff })).await
    }

    /// Listens to notifications of an existing live query. The stream is
    /// closed when the link drops since the engine cannot restart it.
    pub async fn subscribe_live(&self, id: Uuid) -> Result<LiveStream, ClientError> {
        self.subscribe(id, None).await
    }

    /// Closes `stream` and kills its query on the server.
    pub async fn kill(&self, stream: &LiveStream) -> Result<(), ClientError> {
        let (respond, killed) = oneshot::channel();
        self.send(Command::Kill {
            handle: stream.handle,
            respond,
        })
        .await?;
        let Some(id) = killed
            .await
            .map_err(|_| ClientError::ConnectionUnavailable)?
        else {
            return Ok(());
        };
        self.rpc("kill", vec![Value::from(id)]).await.map(|_| ())
    }

    pub async fn use_ns_db(
        &self,
        namespace: Option<&str>,
        database: Option<&str>,
    ) -> Result<(), ClientError> {
        self.rpc("use", vec![Value::from(namespace), Value::from(database)])
            .await
            .map(|_| ())
    }

    /// Returns the server's answer, normally the session token.
    pub async fn signin(&self, credentials: Value) -> Result<Value, ClientError> {
        self.rpc("signin", vec![credentials]).await
    }

    pub async fn signup(&self, credentials: Value) -> Result<Value, ClientError> {
        self.rpc("signup", vec![credentials]).await
    }

    pub async fn authenticate(&self, token: &str) -> Result<(), ClientError> {
        self.rpc("authenticate", vec![Value::from(token)])
            .await
            .map(|_| ())
    }

    pub async fn invalidate(&self) -> Result<(), ClientError> {
        self.rpc("invalidate", Vec::new()).await.map(|_| ())
    }

    pub async fn reset(&self) -> Result<(), ClientError> {
        self.rpc("reset", Vec::new()).await.map(|_| ())
    }

    pub async fn query(&self, text: &str, vars: Value) -> Result<Value, ClientError> {
        self.rpc("query", vec![Value::from(text), vars]).await
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.rpc("ping", Vec::new()).await.map(|_| ())
    }

    pub async fn version(&self) -> Result<String, ClientError> {
        let version = self.rpc("version", Vec::new()).await?;
        version
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Protocol(format!("version is not text: {version:?}")))
    }

    /// Fails pending calls, closes live streams and waits for the engine to
    /// stop. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        let (respond, closed) = oneshot::channel();
        if self.commands.send(Command::Close { respond }).await.is_err() {
            return Ok(());
        }
        let _ = closed.await;
        Ok(())
    }

    async fn subscribe(
        &self,
        id: Uuid,
        query: Option<LiveQuery>,
    ) -> Result<LiveStream, ClientError> {
        let (respond, stream) = oneshot::channel();
        self.send(Command::Subscribe { id, query, respond }).await?;
        stream
            .await
            .map_err(|_| ClientError::ConnectionUnavailable)?
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::ConnectionUnavailable)
    }
}
