use std::fmt;

use tidal_codec::Value;

use crate::rpc::RpcRequest;

/// Lifecycle of the connection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Server-side session state the engine replays after a reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub url: Option<String>,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub token: Option<String>,
}

impl ConnectionState {
    /// Applies the side effect of a successful call.
    pub fn apply(&mut self, request: &RpcRequest, result: &Value) {
        match request.method.as_str() {
            "use" => {
                update_selection(&mut self.namespace, request.params.first());
                update_selection(&mut self.database, request.params.get(1));
            }
            "signin" | "signup" => {
                let token = match result {
                    Value::Text(token) => Some(token.clone()),
                    other => other.get("token").and_then(Value::as_str).map(str::to_string),
                };
                if token.is_some() {
                    self.token = token;
                }
            }
            "authenticate" => {
                if let Some(token) = request.params.first().and_then(Value::as_str) {
                    self.token = Some(token.to_string());
                }
            }
            "invalidate" => self.token = None,
            "reset" => {
                self.namespace = None;
                self.database = None;
                self.token = None;
            }
            _ => {}
        }
    }

    /// Calls that bring a fresh connection back to this state, in order.
    pub fn restore_requests(&self) -> Vec<RpcRequest> {
        let mut requests = Vec::new();
        if self.namespace.is_some() || self.database.is_some() {
            requests.push(RpcRequest::new(
                "use",
                vec![
                    Value::from(self.namespace.clone()),
                    Value::from(self.database.clone()),
                ],
            ));
        }
        if let Some(token) = &self.token {
            requests.push(RpcRequest::new(
                "authenticate",
                vec![Value::from(token.as_str())],
            ));
        }
        requests
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// `null` clears, text sets, anything else (including absence) leaves.
fn update_selection(slot: &mut Option<String>, param: Option<&Value>) {
    match param {
        Some(Value::Null) => *slot = None,
        Some(Value::Text(name)) => *slot = Some(name.clone()),
        _ => {}
    }
}
