use std::fmt;

use bytes::Bytes;

use crate::encode::{encode_into, encode_partial, EncodeOptions, Replacer};
use crate::error::CodecError;
use crate::gap::{Fill, Gap};
use crate::value::Value;
use crate::writer::Writer;

/// An encoding with holes.
///
/// Each chunk is the run of bytes that precedes one gap; `end` follows the
/// last gap. Building the value writes every chunk, then the encoding of the
/// value chosen for its gap, then `end`.
#[derive(Clone)]
pub struct PartiallyEncoded {
    chunks: Vec<(Bytes, Gap)>,
    end: Bytes,
    replacer: Option<Replacer>,
}

impl PartiallyEncoded {
    pub fn new(chunks: Vec<(Bytes, Gap)>, end: Bytes, replacer: Option<Replacer>) -> Self {
        Self {
            chunks,
            end,
            replacer,
        }
    }

    pub fn chunks(&self) -> &[(Bytes, Gap)] {
        &self.chunks
    }

    pub fn end(&self) -> &Bytes {
        &self.end
    }

    /// Gaps in encounter order.
    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.chunks.iter().map(|(_, gap)| gap)
    }

    /// Produces the complete encoding.
    ///
    /// An explicit fill wins over the gap's default; a gap with neither fails
    /// with [`CodecError::FillMissing`].
    pub fn build(&self, fills: &[Fill]) -> Result<Bytes, CodecError> {
        let mut writer = Writer::new();
        for (segment, gap) in &self.chunks {
            writer.write_bytes(segment);
            let value = resolve(gap, fills).ok_or(CodecError::FillMissing)?;
            encode_into(&mut writer, value, self.replacer.as_ref(), fills, false)?;
        }
        writer.write_bytes(&self.end);
        writer.into_bytes()
    }

    /// Fills what it can and keeps every other gap open.
    pub fn build_partial(&self, fills: &[Fill]) -> Result<PartiallyEncoded, CodecError> {
        let mut writer = Writer::new();
        for (segment, gap) in &self.chunks {
            writer.write_bytes(segment);
            match resolve(gap, fills) {
                Some(value) => {
                    encode_into(&mut writer, value, self.replacer.as_ref(), fills, true)?
                }
                None => writer.chunk(gap.clone()),
            }
        }
        writer.write_bytes(&self.end);
        Ok(writer.into_partial(self.replacer.clone()))
    }
}

fn resolve<'a>(gap: &'a Gap, fills: &'a [Fill]) -> Option<&'a Value> {
    fills
        .iter()
        .find(|fill| &fill.gap == gap)
        .map(|fill| &fill.value)
        .or_else(|| gap.default_value())
}

impl PartialEq for PartiallyEncoded {
    fn eq(&self, other: &Self) -> bool {
        self.chunks == other.chunks && self.end == other.end
    }
}

impl fmt::Debug for PartiallyEncoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartiallyEncoded")
            .field("chunks", &self.chunks)
            .field("end", &self.end)
            .field("replacer", &self.replacer.is_some())
            .finish()
    }
}

/// Partially encodes each value of a map independently, keeping keys as-is.
///
/// The result can be embedded in a larger value and built later with fills
/// that differ per request.
pub fn partially_encode_map(
    entries: &[(Value, Value)],
    options: &EncodeOptions<'_>,
) -> Result<Value, CodecError> {
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let partial = encode_partial(value, options)?;
        out.push((key.clone(), Value::Partial(partial)));
    }
    Ok(Value::Map(out))
}
