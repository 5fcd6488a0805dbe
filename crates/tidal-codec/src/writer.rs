use bytes::{BufMut, Bytes, BytesMut};

use crate::encode::Replacer;
use crate::error::CodecError;
use crate::gap::Gap;
use crate::partial::PartiallyEncoded;

const DEFAULT_CAPACITY: usize = 256;

/// The eight top-level CBOR value categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Major {
    Unsigned = 0,
    Negative = 1,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Simple = 7,
}

impl Major {
    /// Extracts the major type from an initial byte.
    pub fn from_initial(byte: u8) -> Self {
        match byte >> 5 {
            0 => Self::Unsigned,
            1 => Self::Negative,
            2 => Self::Bytes,
            3 => Self::Text,
            4 => Self::Array,
            5 => Self::Map,
            6 => Self::Tag,
            _ => Self::Simple,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Append-only byte builder.
///
/// Besides plain appends, a writer can be split at a [`Gap`]: [`Writer::chunk`]
/// seals everything written so far and records the gap that follows it.
#[derive(Debug)]
pub struct Writer {
    buf: BytesMut,
    chunks: Vec<(Bytes, Gap)>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            chunks: Vec::new(),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes a major type with its length/argument in the shortest legal width.
    pub fn write_major(&mut self, major: Major, length: u64) {
        let base = major.bits() << 5;
        if length < 24 {
            self.write_u8(base | length as u8);
        } else if length <= u64::from(u8::MAX) {
            self.write_u8(base | 24);
            self.write_u8(length as u8);
        } else if length <= u64::from(u16::MAX) {
            self.write_u8(base | 25);
            self.write_u16(length as u16);
        } else if length <= u64::from(u32::MAX) {
            self.write_u8(base | 26);
            self.write_u32(length as u32);
        } else {
            self.write_u8(base | 27);
            self.write_u64(length);
        }
    }

    /// Seals the current segment and records `gap` as the hole following it.
    pub fn chunk(&mut self, gap: Gap) {
        let sealed = self.buf.split().freeze();
        self.chunks.push((sealed, gap));
    }

    /// Replays another partial encoding into this writer, keeping its gaps open.
    pub fn write_partially_encoded(&mut self, data: &PartiallyEncoded) {
        for (segment, gap) in data.chunks() {
            self.write_bytes(segment);
            self.chunk(gap.clone());
        }
        self.write_bytes(data.end());
    }

    /// Bytes written to the open segment.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.chunks.is_empty()
    }

    /// Whether any gap has been recorded.
    pub fn is_partial(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Finishes a complete encoding.
    pub fn into_bytes(self) -> Result<Bytes, CodecError> {
        if self.is_partial() {
            return Err(CodecError::FillMissing);
        }
        Ok(self.buf.freeze())
    }

    /// Finishes a partial encoding; `replacer` is reused when gaps are filled.
    pub fn into_partial(self, replacer: Option<Replacer>) -> PartiallyEncoded {
        PartiallyEncoded::new(self.chunks, self.buf.freeze(), replacer)
    }
}

#[cfg(test)]
mod tests {
    use super::{Major, Writer};
    use crate::gap::Gap;

    fn major_bytes(major: Major, length: u64) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_major(major, length);
        w.into_bytes().expect("no gaps").to_vec()
    }

    #[test]
    fn write_major_uses_shortest_width() {
        assert_eq!(major_bytes(Major::Unsigned, 0), vec![0x00]);
        assert_eq!(major_bytes(Major::Unsigned, 23), vec![0x17]);
        assert_eq!(major_bytes(Major::Unsigned, 24), vec![0x18, 0x18]);
        assert_eq!(major_bytes(Major::Unsigned, 255), vec![0x18, 0xff]);
        assert_eq!(major_bytes(Major::Unsigned, 256), vec![0x19, 0x01, 0x00]);
        assert_eq!(major_bytes(Major::Text, 65_535), vec![0x79, 0xff, 0xff]);
        assert_eq!(
            major_bytes(Major::Array, 65_536),
            vec![0x9a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            major_bytes(Major::Negative, u64::from(u32::MAX) + 1),
            vec![0x3b, 0, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn primitives_are_big_endian() {
        let mut w = Writer::new();
        w.write_u16(0x0102);
        w.write_u32(0x0304_0506);
        w.write_f64(1.5);
        let bytes = w.into_bytes().expect("no gaps");
        assert_eq!(&bytes[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&bytes[6..], &1.5_f64.to_be_bytes());
    }

    #[test]
    fn chunk_seals_segment_and_starts_fresh() {
        let gap = Gap::new();
        let mut w = Writer::new();
        w.write_u8(0xa1);
        w.chunk(gap.clone());
        w.write_u8(0xff);
        assert!(w.is_partial());
        assert_eq!(w.len(), 1);

        let partial = w.into_partial(None);
        assert_eq!(partial.chunks().len(), 1);
        assert_eq!(&partial.chunks()[0].0[..], &[0xa1]);
        assert_eq!(partial.chunks()[0].1, gap);
        assert_eq!(&partial.end()[..], &[0xff]);
    }

    #[test]
    fn into_bytes_refuses_open_gaps() {
        let mut w = Writer::new();
        w.chunk(Gap::new());
        assert!(w.into_bytes().is_err());
    }
}
