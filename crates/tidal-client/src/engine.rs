//! The connection engine task.
//!
//! One task owns the link, the correlation-id counter, both emitters and
//! the session state. Client handles talk to it through [`Command`]s, so
//! every step below runs without locks and in a well-defined order:
//! a reply listener is always registered before its request is written,
//! and a frame is fully routed before the next one is read.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tidal_codec::Value;
use tidal_core::{decode_value, encode_value, Uuid};
use tidal_transport::{Connector, Link, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::emitter::{Emitter, ListenerId};
use crate::error::{ClientError, DisconnectReason};
use crate::live::{CloseReason, LiveAction, LiveEvent, LiveMessage, LiveStream};
use crate::reconnect::ReconnectController;
use crate::rpc::{Frame, RpcRequest, RpcResponse};
use crate::state::{ConnectionState, ConnectionStatus};

/// What a caller's reply listener eventually receives.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Response(RpcResponse),
    /// The link dropped before the reply arrived; send the call again.
    Retry,
    Failed(ClientError),
}

/// Hands the caller the listener for its reply once the request is on the
/// wire. Held back while reconnecting.
pub(crate) type Dispatch = oneshot::Sender<Result<oneshot::Receiver<Reply>, ClientError>>;

/// The query behind a managed live subscription.
#[derive(Debug, Clone)]
pub(crate) struct LiveQuery {
    pub what: Value,
    pub diff: bool,
}

pub(crate) enum Command {
    Rpc {
        request: RpcRequest,
        respond: Dispatch,
    },
    Subscribe {
        id: Uuid,
        query: Option<LiveQuery>,
        respond: oneshot::Sender<Result<LiveStream, ClientError>>,
    },
    Kill {
        handle: u64,
        respond: oneshot::Sender<Option<Uuid>>,
    },
    State {
        respond: oneshot::Sender<ConnectionState>,
    },
    Close {
        respond: oneshot::Sender<()>,
    },
}

struct Subscription {
    id: Uuid,
    query: Option<LiveQuery>,
    listener: ListenerId,
    events: mpsc::UnboundedSender<LiveEvent>,
    id_tx: watch::Sender<Uuid>,
    alive: Arc<AtomicBool>,
}

impl Subscription {
    fn close(self, reason: CloseReason) {
        self.alive.store(false, Ordering::Release);
        let _ = self.events.send(LiveEvent::Closed(reason));
    }
}

/// Why the engine stopped serving the current link.
enum Interrupt {
    Lost,
    Closed,
    Protocol(ClientError),
}

pub(crate) struct Engine {
    url: String,
    connector: Arc<dyn Connector>,
    keepalive: Duration,
    state: ConnectionState,
    controller: ReconnectController,
    replies: Emitter<u64, Reply>,
    live: Emitter<Uuid, LiveMessage>,
    inflight: HashMap<u64, RpcRequest>,
    subscriptions: HashMap<u64, Subscription>,
    /// Live query ids whose notifications are dropped rather than buffered.
    retired: HashSet<Uuid>,
    /// The keep-alive ping still waiting for its reply.
    keepalive_pending: Option<u64>,
    deferred: VecDeque<(RpcRequest, Dispatch)>,
    next_id: u64,
    next_handle: u64,
    link: Option<Link>,
    link_broken: bool,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::Receiver<Command>,
    closer: Option<oneshot::Sender<()>>,
}

impl Engine {
    pub(crate) fn new(
        url: String,
        connector: Arc<dyn Connector>,
        config: &ClientConfig,
        commands: mpsc::Receiver<Command>,
        status: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            url,
            connector,
            keepalive: config.keepalive_interval,
            state: ConnectionState::default(),
            controller: ReconnectController::new(config.reconnect.clone()),
            replies: Emitter::new(),
            live: Emitter::with_collect_limit(config.notification_buffer_capacity),
            inflight: HashMap::new(),
            subscriptions: HashMap::new(),
            retired: HashSet::new(),
            keepalive_pending: None,
            deferred: VecDeque::new(),
            next_id: 1,
            next_handle: 1,
            link: None,
            link_broken: false,
            status,
            commands,
            closer: None,
        }
    }

    /// Opens the first link. Failure here is reported to the caller rather
    /// than retried.
    pub(crate) async fn open(&mut self) -> Result<(), ClientError> {
        self.set_status(ConnectionStatus::Connecting);
        info!(url = %self.url, "connecting");
        let connect = self.connector.connect(&self.url);
        match connect.await {
            Ok(link) => {
                self.attach(link);
                self.state.url = Some(self.url.clone());
                self.controller.reset();
                self.set_status(ConnectionStatus::Connected);
                Ok(())
            }
            Err(err) => {
                warn!(url = %self.url, %err, "connect failed");
                self.set_status(ConnectionStatus::Error);
                Err(err.into())
            }
        }
    }

    pub(crate) async fn run(mut self) {
        let reason = loop {
            let reason = match self.serve().await {
                Interrupt::Closed => DisconnectReason::Closed,
                Interrupt::Protocol(err) => {
                    error!(%err, "protocol error, dropping connection");
                    DisconnectReason::Protocol
                }
                Interrupt::Lost if !self.controller.enabled() => {
                    warn!(url = %self.url, "transport lost");
                    DisconnectReason::TransportLost
                }
                Interrupt::Lost => match self.reconnect().await {
                    Ok(()) => continue,
                    Err(reason) => reason,
                },
            };
            break reason;
        };
        self.shutdown(reason);
        if reason != DisconnectReason::Closed {
            self.idle().await;
        }
        if let Some(closer) = self.closer.take() {
            let _ = closer.send(());
        }
        debug!(url = %self.url, "engine stopped");
    }

    async fn serve(&mut self) -> Interrupt {
        let mut keepalive = time::interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if self.closer.is_some() {
                return Interrupt::Closed;
            }
            if self.link_broken {
                return Interrupt::Lost;
            }
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some((request, respond)) = self.handle_local(command) {
                            let result = self.dispatch(request).await;
                            let _ = respond.send(result);
                        }
                    }
                    None => return Interrupt::Closed,
                },
                frame = recv_frame(&mut self.link) => match frame {
                    Some(bytes) => {
                        if let Err(err) = self.handle_frame(&bytes) {
                            return Interrupt::Protocol(err);
                        }
                    }
                    None => return Interrupt::Lost,
                },
                _ = keepalive.tick() => self.ping().await,
            }
        }
    }

    /// Answers commands while the engine has given up, until closed.
    async fn idle(&mut self) {
        while self.closer.is_none() {
            let Some(command) = self.commands.recv().await else {
                return;
            };
            if let Some((_, respond)) = self.handle_local(command) {
                let _ = respond.send(Err(ClientError::ConnectionUnavailable));
            }
        }
    }

    /// Handles every command that needs no I/O and hands RPCs back.
    fn handle_local(&mut self, command: Command) -> Option<(RpcRequest, Dispatch)> {
        match command {
            Command::Rpc { request, respond } => return Some((request, respond)),
            Command::Subscribe { id, query, respond } => {
                let status = *self.status.borrow();
                let accepted = status == ConnectionStatus::Connected
                    || (status == ConnectionStatus::Reconnecting && query.is_some());
                let result = if accepted {
                    Ok(self.register_live(id, query))
                } else {
                    Err(ClientError::ConnectionUnavailable)
                };
                let _ = respond.send(result);
            }
            Command::Kill { handle, respond } => {
                let id = self.subscriptions.get(&handle).map(|sub| sub.id);
                self.close_subscription(handle, CloseReason::Killed);
                let _ = respond.send(id);
            }
            Command::State { respond } => {
                let _ = respond.send(self.state.clone());
            }
            Command::Close { respond } => self.closer = Some(respond),
        }
        None
    }

    /// Writes `request` under a fresh correlation id and returns the
    /// listener for its reply.
    async fn dispatch(
        &mut self,
        request: RpcRequest,
    ) -> Result<oneshot::Receiver<Reply>, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        let bytes = encode_value(&request.to_frame(id))?;
        if let Some(hint) = self.connector.max_payload_hint() {
            if bytes.len() > hint {
                return Err(TransportError::PayloadTooLarge {
                    len: bytes.len(),
                    hint,
                }
                .into());
            }
        }
        let reply = self.replies.subscribe_once(id, false);
        debug!(id, method = %request.method, "sending request");
        self.inflight.insert(id, request);
        self.write(bytes).await;
        Ok(reply)
    }

    async fn write(&mut self, bytes: Bytes) {
        let Some(outbound) = self.link.as_ref().map(|link| link.outbound.clone()) else {
            self.link_broken = true;
            return;
        };
        if outbound.send(bytes).await.is_err() {
            warn!(url = %self.url, "outbound link closed");
            self.link_broken = true;
        }
    }

    /// Sends a keep-alive ping unless the previous one is still unanswered.
    async fn ping(&mut self) {
        if let Some(id) = self.keepalive_pending {
            if self.inflight.contains_key(&id) {
                debug!(id, "previous keep-alive ping unanswered, skipping");
                return;
            }
        }
        let id = self.next_id;
        match self.dispatch(RpcRequest::new("ping", Vec::new())).await {
            Ok(_) => {
                self.keepalive_pending = Some(id);
                debug!(id, "keep-alive ping sent");
            }
            Err(err) => warn!(%err, "keep-alive ping failed"),
        }
    }

    fn handle_frame(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let value = decode_value(bytes)?;
        match Frame::parse(value)? {
            Frame::Reply { id, response } => self.route_reply(id, response),
            Frame::Notification(message) => self.route_notification(message),
        }
        Ok(())
    }

    fn route_reply(&mut self, id: u64, response: RpcResponse) {
        let Some(request) = self.inflight.remove(&id) else {
            warn!(id, "reply for unknown request id");
            return;
        };
        if let Ok(result) = &response {
            self.state.apply(&request, result);
        }
        if self.replies.emit(&id, Reply::Response(response)) == 0 {
            debug!(id, method = %request.method, "reply had no waiting caller");
        }
    }

    fn route_notification(&mut self, message: LiveMessage) {
        let id = message.id;
        if self.retired.contains(&id) {
            debug!(%id, action = %message.action, "dropping notification for retired live query");
            return;
        }
        let killed = message.action == LiveAction::Killed;
        if !killed && !self.live.has_listeners(&id) && self.live.collect_full() {
            warn!(%id, action = %message.action, "notification buffer full, dropping notification");
            return;
        }
        self.live.emit_collectable(&id, message);
        if killed {
            match self.handle_for(id) {
                Some(handle) => self.close_subscription(handle, CloseReason::Killed),
                None => self.live.reset_collectable(&id),
            }
        }
    }

    fn register_live(&mut self, id: Uuid, query: Option<LiveQuery>) -> LiveStream {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.retired.remove(&id);
        let (events, rx) = mpsc::unbounded_channel();
        let (id_tx, id_rx) = watch::channel(id);
        let alive = Arc::new(AtomicBool::new(true));
        let listener = self.live.subscribe_historic(id, forward_to(events.clone()));
        debug!(%id, handle, managed = query.is_some(), "live subscription registered");
        self.subscriptions.insert(
            handle,
            Subscription {
                id,
                query,
                listener,
                events,
                id_tx,
                alive: alive.clone(),
            },
        );
        LiveStream {
            handle,
            id: id_rx,
            events: rx,
            alive,
        }
    }

    fn handle_for(&self, id: Uuid) -> Option<u64> {
        self.subscriptions
            .iter()
            .find(|(_, sub)| sub.id == id)
            .map(|(handle, _)| *handle)
    }

    fn close_subscription(&mut self, handle: u64, reason: CloseReason) {
        let Some(sub) = self.subscriptions.remove(&handle) else {
            return;
        };
        self.live.unsubscribe(&sub.id, sub.listener);
        self.live.reset_collectable(&sub.id);
        self.retire(sub.id);
        debug!(id = %sub.id, ?reason, "live subscription closed");
        sub.close(reason);
    }

    /// Moves a managed subscription onto the id its restarted query got.
    fn rebind(&mut self, handle: u64, id: Uuid) {
        let Some(sub) = self.subscriptions.get_mut(&handle) else {
            return;
        };
        let previous = sub.id;
        self.live.unsubscribe(&previous, sub.listener);
        self.live.reset_collectable(&previous);
        sub.listener = self
            .live
            .subscribe_historic(id, forward_to(sub.events.clone()));
        sub.id = id;
        sub.id_tx.send_replace(id);
        if previous != id {
            self.retire(previous);
        }
        info!(%previous, %id, "live query restarted");
    }

    /// Stops buffering notifications for `id` once no subscription uses it.
    fn retire(&mut self, id: Uuid) {
        if self.handle_for(id).is_none() {
            self.live.reset_collectable(&id);
            self.retired.insert(id);
        }
    }

    fn attach(&mut self, link: Link) {
        self.link = Some(link);
        self.link_broken = false;
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        let previous = *self.status.borrow();
        if previous != status {
            debug!(%previous, %status, "connection status changed");
            self.status.send_replace(status);
        }
    }

    /// Signals every caller still waiting on the dropped link to re-send.
    fn retry_inflight(&mut self) {
        for (id, request) in std::mem::take(&mut self.inflight) {
            debug!(id, method = %request.method, "request interrupted, asking caller to retry");
            self.replies.emit(&id, Reply::Retry);
        }
    }

    async fn reconnect(&mut self) -> Result<(), DisconnectReason> {
        self.link = None;
        self.set_status(ConnectionStatus::Reconnecting);
        self.retry_inflight();
        let unmanaged: Vec<u64> = self
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.query.is_none())
            .map(|(handle, _)| *handle)
            .collect();
        for handle in unmanaged {
            self.close_subscription(handle, CloseReason::Disconnected);
        }

        loop {
            let Ok(delay) = self.controller.begin_attempt() else {
                warn!(
                    url = %self.url,
                    attempts = self.controller.attempts(),
                    "giving up on reconnection"
                );
                return Err(DisconnectReason::ReconnectExhausted);
            };
            info!(url = %self.url, attempt = self.controller.attempts(), ?delay, "reconnecting");
            self.until_command(time::sleep(delay))
                .await
                .ok_or(DisconnectReason::Closed)?;

            let connect = self.connector.connect(&self.url);
            match self
                .until_command(connect)
                .await
                .ok_or(DisconnectReason::Closed)?
            {
                Ok(link) => self.attach(link),
                Err(err) => {
                    warn!(url = %self.url, %err, "reconnection attempt failed");
                    continue;
                }
            }

            match self.restore().await {
                Ok(()) => {}
                Err(Interrupt::Lost) => {
                    warn!(url = %self.url, "link lost while restoring session");
                    self.link = None;
                    self.retry_inflight();
                    continue;
                }
                Err(Interrupt::Closed) => return Err(DisconnectReason::Closed),
                Err(Interrupt::Protocol(err)) => {
                    error!(%err, "protocol error while restoring session");
                    return Err(DisconnectReason::Protocol);
                }
            }

            self.set_status(ConnectionStatus::Connected);
            while let Some((request, respond)) = self.deferred.pop_front() {
                let result = self.dispatch(request).await;
                let _ = respond.send(result);
            }
            self.controller.reset();
            info!(url = %self.url, "reconnected");
            return Ok(());
        }
    }

    /// Replays `use` and `authenticate`, then restarts managed live queries.
    async fn restore(&mut self) -> Result<(), Interrupt> {
        for request in self.state.restore_requests() {
            let method = request.method.clone();
            if let Err(err) = self.call_direct(request).await? {
                warn!(%method, %err, "failed to restore session state");
                if method == "authenticate" {
                    self.state.token = None;
                }
            }
        }

        // Subscriptions registered while a restart is awaited are picked up
        // by the next pass.
        let mut restarted = HashSet::new();
        while let Some((handle, query)) = self.next_unrestarted(&restarted) {
            restarted.insert(handle);
            let request = RpcRequest::new("live", vec![query.what, Value::Bool(query.diff)]);
            match self.call_direct(request).await? {
                Ok(value) => match Uuid::try_from(&value) {
                    Ok(id) => self.rebind(handle, id),
                    Err(err) => {
                        warn!(%err, "restarted live query returned an invalid id");
                        self.close_subscription(handle, CloseReason::Disconnected);
                    }
                },
                Err(err) => {
                    warn!(%err, "failed to restart live query");
                    self.close_subscription(handle, CloseReason::Disconnected);
                }
            }
        }
        Ok(())
    }

    fn next_unrestarted(&self, restarted: &HashSet<u64>) -> Option<(u64, LiveQuery)> {
        self.subscriptions
            .iter()
            .filter(|(handle, _)| !restarted.contains(*handle))
            .filter_map(|(handle, sub)| sub.query.clone().map(|query| (*handle, query)))
            .min_by_key(|(handle, _)| *handle)
    }

    /// Sends one request and routes inbound frames until its reply shows up.
    /// Client RPCs arriving meanwhile are queued for after the restore.
    async fn call_direct(
        &mut self,
        request: RpcRequest,
    ) -> Result<Result<Value, ClientError>, Interrupt> {
        let mut reply = match self.dispatch(request).await {
            Ok(reply) => reply,
            Err(err) => return Ok(Err(err)),
        };
        loop {
            match reply.try_recv() {
                Ok(Reply::Response(response)) => return Ok(response.map_err(ClientError::from)),
                Ok(Reply::Failed(err)) => return Ok(Err(err)),
                Ok(Reply::Retry) | Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(Interrupt::Lost)
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            if self.closer.is_some() {
                return Err(Interrupt::Closed);
            }
            if self.link_broken {
                return Err(Interrupt::Lost);
            }
            tokio::select! {
                frame = recv_frame(&mut self.link) => match frame {
                    Some(bytes) => {
                        if let Err(err) = self.handle_frame(&bytes) {
                            return Err(Interrupt::Protocol(err));
                        }
                    }
                    None => return Err(Interrupt::Lost),
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(rpc) = self.handle_local(command) {
                            self.deferred.push_back(rpc);
                        }
                    }
                    None => return Err(Interrupt::Closed),
                },
            }
        }
    }

    /// Drives `future` while still accepting commands; RPCs are deferred.
    /// Returns `None` if the engine was asked to close first.
    async fn until_command<F: Future>(&mut self, future: F) -> Option<F::Output> {
        tokio::pin!(future);
        loop {
            if self.closer.is_some() {
                return None;
            }
            tokio::select! {
                output = &mut future => return Some(output),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(rpc) = self.handle_local(command) {
                            self.deferred.push_back(rpc);
                        }
                    }
                    None => return None,
                },
            }
        }
    }

    /// Fails everything still pending and settles the final status.
    fn shutdown(&mut self, reason: DisconnectReason) {
        self.link = None;
        let error = ClientError::Disconnected(reason);
        for (id, _) in std::mem::take(&mut self.inflight) {
            self.replies.emit(&id, Reply::Failed(error.clone()));
        }
        for (_, respond) in std::mem::take(&mut self.deferred) {
            let _ = respond.send(Err(error.clone()));
        }
        let handles: Vec<u64> = self.subscriptions.keys().copied().collect();
        for handle in handles {
            self.close_subscription(handle, CloseReason::Disconnected);
        }
        let status = match reason {
            DisconnectReason::Closed => {
                self.state.clear();
                ConnectionStatus::Disconnected
            }
            DisconnectReason::TransportLost => ConnectionStatus::Disconnected,
            DisconnectReason::ReconnectExhausted | DisconnectReason::Protocol => {
                ConnectionStatus::Error
            }
        };
        self.set_status(status);
        info!(url = %self.url, %reason, "connection shut down");
    }
}

async fn recv_frame(link: &mut Option<Link>) -> Option<Bytes> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => None,
    }
}

fn forward_to(events: mpsc::UnboundedSender<LiveEvent>) -> impl FnMut(LiveMessage) + Send + 'static {
    move |message| {
        let _ = events.send(LiveEvent::Message(message));
    }
}
