//! Request and reply frames exchanged with the server.

use tidal_codec::Value;
use tidal_core::Uuid;

use crate::error::ClientError;
use crate::live::{LiveAction, LiveMessage};

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The `{id, method, params}` map sent on the wire.
    pub fn to_frame(&self, id: u64) -> Value {
        Value::Map(vec![
            (Value::from("id"), Value::from(id)),
            (Value::from("method"), Value::from(self.method.as_str())),
            (Value::from("params"), Value::Array(self.params.clone())),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        ClientError::Server {
            code: err.code,
            message: err.message,
        }
    }
}

pub type RpcResponse = Result<Value, RpcError>;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Reply { id: u64, response: RpcResponse },
    Notification(LiveMessage),
}

impl Frame {
    pub fn parse(value: Value) -> Result<Self, ClientError> {
        if !matches!(value, Value::Map(_)) {
            return Err(ClientError::protocol("frame is not a map"));
        }
        match value.get("id") {
            Some(id) if !id.is_nullish() => {
                let id = id
                    .as_u64()
                    .ok_or_else(|| ClientError::protocol(format!("invalid reply id {id:?}")))?;
                let response = parse_response(&value)?;
                Ok(Frame::Reply { id, response })
            }
            _ => {
                if let Some(error) = value.get("error") {
                    let error = parse_error(error)?;
                    return Err(ClientError::protocol(format!(
                        "uncorrelated server error {}: {}",
                        error.code, error.message
                    )));
                }
                let result = value
                    .get("result")
                    .ok_or_else(|| ClientError::protocol("unexpected server response"))?;
                parse_notification(result).map(Frame::Notification)
            }
        }
    }
}

fn parse_response(frame: &Value) -> Result<RpcResponse, ClientError> {
    if let Some(error) = frame.get("error") {
        return Ok(Err(parse_error(error)?));
    }
    // A missing result is how the server answers calls like `use`.
    Ok(Ok(frame.get("result").cloned().unwrap_or(Value::Null)))
}

fn parse_error(error: &Value) -> Result<RpcError, ClientError> {
    let code = error
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| ClientError::protocol("error object without integer code"))?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::protocol("error object without message"))?;
    Ok(RpcError {
        code,
        message: message.to_string(),
    })
}

fn parse_notification(result: &Value) -> Result<LiveMessage, ClientError> {
    let id = result
        .get("id")
        .ok_or_else(|| ClientError::protocol("notification without id"))?;
    let id = Uuid::try_from(id)
        .map_err(|err| ClientError::protocol(format!("notification id: {err}")))?;
    let action = result
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::protocol("notification without action"))?
        .parse::<LiveAction>()?;
    let result = result.get("result").cloned().unwrap_or(Value::Null);
    Ok(LiveMessage { id, action, result })
}
