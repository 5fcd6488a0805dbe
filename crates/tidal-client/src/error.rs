use std::fmt;

use thiserror::Error;
use tidal_codec::CodecError;
use tidal_transport::TransportError;

/// Why the engine gave up on pending calls or live streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `Client::close` was called or every client handle was dropped.
    Closed,
    /// The link dropped and reconnection is disabled.
    TransportLost,
    /// The reconnection controller ran out of attempts.
    ReconnectExhausted,
    /// The server sent a frame the engine could not make sense of.
    Protocol,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Closed => "connection closed",
            Self::TransportLost => "transport lost",
            Self::ReconnectExhausted => "reconnection attempts exhausted",
            Self::Protocol => "protocol error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Well-formed CBOR with a shape the engine does not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The server answered the request with an error object.
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("disconnected: {0}")]
    Disconnected(DisconnectReason),
    #[error("reconnection attempts exhausted")]
    ReconnectExhausted,
    #[error("connection unavailable")]
    ConnectionUnavailable,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
