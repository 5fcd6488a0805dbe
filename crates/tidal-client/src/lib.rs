//! Tidal client runtime.
//!
//! A [`Client`] is a cheap handle onto one connection engine task. The
//! engine multiplexes RPC calls by correlation id over a single link,
//! routes live-query notifications, and transparently re-establishes the
//! link (replaying namespace, authentication, and live queries) when it
//! drops.

pub mod client;
pub mod config;
pub mod emitter;
mod engine;
pub mod error;
pub mod live;
pub mod reconnect;
pub mod rpc;
pub mod state;

pub use client::Client;
pub use config::{ClientConfig, ReconnectConfig};
pub use emitter::{Emitter, ListenerId};
pub use error::{ClientError, DisconnectReason};
pub use live::{CloseReason, LiveAction, LiveEvent, LiveMessage, LiveStream};
pub use reconnect::ReconnectController;
pub use rpc::{Frame, RpcError, RpcRequest, RpcResponse};
pub use state::{ConnectionState, ConnectionStatus};

pub use tidal_codec::Value;
pub use tidal_core::Uuid;
