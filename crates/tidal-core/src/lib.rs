//! Domain values shared across Tidal crates.
//!
//! Includes the semantic tag table, typed wrappers for tagged values, and
//! the codec hooks that normalize them on the wire.

pub mod decimal;
pub mod error;
pub mod geometry;
pub mod hooks;
pub mod range;
pub mod record;
pub mod tags;
pub mod time;
pub mod uuid;

pub use decimal::{Decimal, Future};
pub use error::CoreError;
pub use geometry::{Geometry, Point};
pub use hooks::{
    decode_options, decode_replacer, decode_value, encode_options, encode_replacer, encode_value,
};
pub use range::{Bound, Range};
pub use record::{RecordId, RecordIdKey, RecordIdRange, StringRecordId, Table};
pub use time::{Datetime, Duration};
pub use uuid::Uuid;

pub use tidal_codec::Value;
