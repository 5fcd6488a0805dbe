//! Semantic tag numbers understood by the server.

/// RFC 3339 datetime text.
pub const TAG_STANDARD_DATETIME: u64 = 0;
/// 16-byte binary UUID.
pub const TAG_STANDARD_UUID: u64 = 37;

pub const TAG_NONE: u64 = 6;
pub const TAG_TABLE: u64 = 7;
pub const TAG_RECORDID: u64 = 8;
pub const TAG_STRING_UUID: u64 = 9;
pub const TAG_STRING_DECIMAL: u64 = 10;
/// `[seconds, nanoseconds]` since the Unix epoch.
pub const TAG_CUSTOM_DATETIME: u64 = 12;
pub const TAG_STRING_DURATION: u64 = 13;
/// `[seconds, nanoseconds]` with trailing zero parts omitted.
pub const TAG_CUSTOM_DURATION: u64 = 14;
pub const TAG_FUTURE: u64 = 15;

pub const TAG_RANGE: u64 = 49;
pub const TAG_BOUND_INCLUDED: u64 = 50;
pub const TAG_BOUND_EXCLUDED: u64 = 51;

pub const TAG_GEOMETRY_POINT: u64 = 88;
pub const TAG_GEOMETRY_LINE: u64 = 89;
pub const TAG_GEOMETRY_POLYGON: u64 = 90;
pub const TAG_GEOMETRY_MULTIPOINT: u64 = 91;
pub const TAG_GEOMETRY_MULTILINE: u64 = 92;
pub const TAG_GEOMETRY_MULTIPOLYGON: u64 = 93;
pub const TAG_GEOMETRY_COLLECTION: u64 = 94;
