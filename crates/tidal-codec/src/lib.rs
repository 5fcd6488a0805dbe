//! Tidal wire codec.
//!
//! A self-describing CBOR codec over a closed [`Value`] type, with
//! substitution hooks for domain types and deferred ("partial") encoding
//! through identity-keyed [`Gap`] placeholders.

pub mod decode;
pub mod encode;
pub mod error;
pub mod gap;
pub mod partial;
pub mod reader;
pub mod value;
pub mod writer;

pub use decode::{
    decode, decode_all, decode_with, DecodeOptions, DecodeReplacer, TagHook, MAX_DEPTH,
};
pub use encode::{encode, encode_partial, encode_with, EncodeOptions, Replacer};
pub use error::CodecError;
pub use gap::{Fill, Gap};
pub use partial::{partially_encode_map, PartiallyEncoded};
pub use reader::Reader;
pub use value::Value;
pub use writer::{Major, Writer};

/// Largest magnitude accepted for integers (`2^64`).
pub const POW_2_64: i128 = 1 << 64;
