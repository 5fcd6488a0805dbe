use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tidal_codec::Value;
use tidal_core::Uuid;
use tokio::sync::{mpsc, watch};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveAction {
    Create,
    Update,
    Delete,
    /// The server ended the live query.
    Killed,
}

impl LiveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for LiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiveAction {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "KILLED" => Ok(Self::Killed),
            other => Err(ClientError::protocol(format!(
                "unknown live action {other:?}"
            ))),
        }
    }
}

/// One row change pushed by the server for a live query.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMessage {
    pub id: Uuid,
    pub action: LiveAction,
    pub result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Killed,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Message(LiveMessage),
    /// Always the last event of a stream.
    Closed(CloseReason),
}

/// Receiving side of a live subscription.
///
/// The server-side id can change when the engine restarts the query after
/// a reconnect; the stream itself stays the same.
#[derive(Debug)]
pub struct LiveStream {
    pub(crate) handle: u64,
    pub(crate) id: watch::Receiver<Uuid>,
    pub(crate) events: mpsc::UnboundedReceiver<LiveEvent>,
    pub(crate) alive: Arc<AtomicBool>,
}

impl LiveStream {
    /// Current server-side id.
    pub fn id(&self) -> Uuid {
        *self.id.borrow()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Next notification, then `Closed`, then `None`.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Like [`LiveStream::next`] but skips the close marker.
    pub async fn next_message(&mut self) -> Option<LiveMessage> {
        match self.events.recv().await? {
            LiveEvent::Message(message) => Some(message),
            LiveEvent::Closed(_) => None,
        }
    }
}

impl Stream for LiveStream {
    type Item = LiveEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_wire_text() {
        for action in [
            LiveAction::Create,
            LiveAction::Update,
            LiveAction::Delete,
            LiveAction::Killed,
        ] {
            assert_eq!(action.as_str().parse::<LiveAction>(), Ok(action));
        }
        assert!(matches!(
            "create".parse::<LiveAction>(),
            Err(ClientError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn stream_ends_after_close_marker() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_id_tx, id_rx) = watch::channel(Uuid::from_bytes([7; 16]));
        let mut stream = LiveStream {
            handle: 1,
            id: id_rx,
            events: rx,
            alive: Arc::new(AtomicBool::new(true)),
        };
        let message = LiveMessage {
            id: stream.id(),
            action: LiveAction::Create,
            result: Value::map([("name", "tobie")]),
        };
        tx.send(LiveEvent::Message(message.clone())).expect("send");
        tx.send(LiveEvent::Closed(CloseReason::Killed)).expect("send");
        drop(tx);

        assert_eq!(stream.next().await, Some(LiveEvent::Message(message)));
        assert_eq!(
            stream.next().await,
            Some(LiveEvent::Closed(CloseReason::Killed))
        );
        assert_eq!(stream.next().await, None);
    }
}
