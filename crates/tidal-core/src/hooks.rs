//! Codec hooks that normalize tagged values on the wire.

use std::sync::Arc;

use bytes::Bytes;
use tidal_codec::{
    decode_all, encode_with, CodecError, DecodeOptions, DecodeReplacer, EncodeOptions, Replacer,
    Value,
};

use crate::tags::{TAG_NONE, TAG_STRING_DURATION, TAG_STRING_UUID};
use crate::time::Duration;
use crate::uuid::Uuid;

/// Sends `Undefined` as the `NONE` tag.
pub fn encode_replacer() -> Replacer {
    Arc::new(|value: &Value| match value {
        Value::Undefined => Some(Value::tagged(TAG_NONE, Value::Null)),
        _ => None,
    })
}

/// Maps `NONE` back to `Undefined` and folds textual UUIDs and durations
/// into their binary/compact tags. Malformed text is left as received.
pub fn decode_replacer() -> DecodeReplacer {
    Arc::new(|value: Value| match value {
        Value::Tagged(TAG_NONE, _) => Value::Undefined,
        Value::Tagged(TAG_STRING_UUID, inner) => {
            let parsed = inner.as_str().map(Uuid::parse);
            match parsed {
                Some(Ok(uuid)) => Value::from(uuid),
                _ => Value::Tagged(TAG_STRING_UUID, inner),
            }
        }
        Value::Tagged(TAG_STRING_DURATION, inner) => {
            let parsed = inner.as_str().map(Duration::parse);
            match parsed {
                Some(Ok(duration)) => Value::from(duration),
                _ => Value::Tagged(TAG_STRING_DURATION, inner),
            }
        }
        other => other,
    })
}

pub fn encode_options<'a>() -> EncodeOptions<'a> {
    EncodeOptions::with_replacer(encode_replacer())
}

pub fn decode_options() -> DecodeOptions {
    DecodeOptions::with_replacer(decode_replacer())
}

/// Encodes `value` with the domain hooks installed.
pub fn encode_value(value: &Value) -> Result<Bytes, CodecError> {
    encode_with(value, &encode_options())
}

/// Decodes exactly one value with the domain hooks installed.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CodecError> {
    decode_all(bytes, &decode_options())
}
