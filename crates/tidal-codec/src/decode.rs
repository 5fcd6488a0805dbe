use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CodecError;
use crate::reader::{Reader, INDEFINITE};
use crate::value::Value;
use crate::writer::Major;

/// Post-order substitution hook applied to every decoded value.
pub type DecodeReplacer = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Converts the content of one semantic tag into its replacement.
pub type TagHook = Arc<dyn Fn(Value) -> Result<Value, CodecError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct DecodeOptions {
    pub replacer: Option<DecodeReplacer>,
    /// Hooks keyed by tag number; untagged content is passed in.
    pub tagged: HashMap<u64, TagHook>,
}

impl DecodeOptions {
    pub fn with_replacer(replacer: DecodeReplacer) -> Self {
        Self {
            replacer: Some(replacer),
            tagged: HashMap::new(),
        }
    }

    pub fn tag(mut self, tag: u64, hook: TagHook) -> Self {
        self.tagged.insert(tag, hook);
        self
    }
}

/// Deepest nesting of arrays, maps and tags the decoder accepts.
pub const MAX_DEPTH: usize = 256;

/// Decodes a single value from the front of `bytes`; trailing bytes are ignored.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    decode_with(bytes, &DecodeOptions::default())
}

pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<Value, CodecError> {
    let mut reader = Reader::new(bytes);
    Decoder {
        reader: &mut reader,
        options,
        depth: 0,
    }
    .value()
}

/// Decodes exactly one value spanning all of `bytes`.
pub fn decode_all(bytes: &[u8], options: &DecodeOptions) -> Result<Value, CodecError> {
    let mut reader = Reader::new(bytes);
    let value = Decoder {
        reader: &mut reader,
        options,
        depth: 0,
    }
    .value()?;
    match reader.remaining() {
        0 => Ok(value),
        n => Err(CodecError::TrailingBytes(n)),
    }
}

enum Item {
    Value(Value),
    Break,
}

struct Decoder<'r, 'a> {
    reader: &'r mut Reader<'a>,
    options: &'r DecodeOptions,
    depth: usize,
}

impl Decoder<'_, '_> {
    fn value(&mut self) -> Result<Value, CodecError> {
        match self.item()? {
            Item::Value(value) => Ok(value),
            Item::Break => Err(CodecError::UnexpectedBreak),
        }
    }

    fn item(&mut self) -> Result<Item, CodecError> {
        let (major, info) = self.reader.read_major()?;
        let value = match major {
            Major::Unsigned => Value::Integer(i128::from(self.reader.read_major_length(info)?)),
            Major::Negative => {
                Value::Integer(-1 - i128::from(self.reader.read_major_length(info)?))
            }
            Major::Bytes => Value::Bytes(self.string(Major::Bytes, info)?),
            Major::Text => {
                let raw = self.string(Major::Text, info)?;
                Value::Text(String::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?)
            }
            Major::Array => {
                self.descend()?;
                let items = self.array(info)?;
                self.depth -= 1;
                Value::Array(items)
            }
            Major::Map => {
                self.descend()?;
                let entries = self.map(info)?;
                self.depth -= 1;
                Value::Map(entries)
            }
            Major::Tag => {
                let tag = self.reader.read_major_length(info)?;
                self.descend()?;
                let inner = self.value()?;
                self.depth -= 1;
                match self.options.tagged.get(&tag) {
                    Some(hook) => hook(inner)?,
                    None => Value::Tagged(tag, Box::new(inner)),
                }
            }
            Major::Simple => match info {
                20 => Value::Bool(false),
                21 => Value::Bool(true),
                22 => Value::Null,
                23 => Value::Undefined,
                25 => Value::Float(self.reader.read_f16()?),
                26 => Value::Float(f64::from(self.reader.read_f32()?)),
                27 => Value::Float(self.reader.read_f64()?),
                28..=30 => return Err(CodecError::InvalidLength(info)),
                INDEFINITE => return Ok(Item::Break),
                other => return Err(CodecError::UnsupportedSimple(other)),
            },
        };

        Ok(Item::Value(match &self.options.replacer {
            Some(replace) => replace(value),
            None => value,
        }))
    }

    fn descend(&mut self) -> Result<(), CodecError> {
        if self.depth == MAX_DEPTH {
            return Err(CodecError::DepthExceeded(MAX_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    fn length(&mut self, info: u8) -> Result<usize, CodecError> {
        let length = self.reader.read_major_length(info)?;
        usize::try_from(length).map_err(|_| CodecError::Number("length exceeds addressable memory"))
    }

    fn string(&mut self, major: Major, info: u8) -> Result<Vec<u8>, CodecError> {
        if info != INDEFINITE {
            let length = self.length(info)?;
            return Ok(self.reader.read_bytes(length)?.to_vec());
        }

        let mut out = Vec::new();
        loop {
            let (chunk_major, chunk_info) = self.reader.read_major()?;
            if chunk_major == Major::Simple && chunk_info == INDEFINITE {
                return Ok(out);
            }
            if chunk_major != major {
                return Err(CodecError::InvalidMajor {
                    major: chunk_major.bits(),
                    context: "chunk of indefinite-length string",
                });
            }
            if chunk_info == INDEFINITE {
                return Err(CodecError::NestedIndefinite);
            }
            let length = self.length(chunk_info)?;
            out.extend_from_slice(self.reader.read_bytes(length)?);
        }
    }

    fn array(&mut self, info: u8) -> Result<Vec<Value>, CodecError> {
        if info == INDEFINITE {
            let mut out = Vec::new();
            while let Item::Value(value) = self.item()? {
                out.push(value);
            }
            return Ok(out);
        }

        let length = self.length(info)?;
        // Every element needs at least one byte.
        let mut out = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
            out.push(self.value()?);
        }
        Ok(out)
    }

    fn map(&mut self, info: u8) -> Result<Vec<(Value, Value)>, CodecError> {
        if info == INDEFINITE {
            let mut out = Vec::new();
            while let Item::Value(key) = self.item()? {
                let value = self.value()?;
                out.push((key, value));
            }
            return Ok(out);
        }

        let length = self.length(info)?;
        let mut out = Vec::with_capacity(length.min(self.reader.remaining() / 2));
        for _ in 0..length {
            let key = self.value()?;
            let value = self.value()?;
            out.push((key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{decode, decode_all, decode_with, DecodeOptions};
    use crate::error::CodecError;
    use crate::value::Value;

    #[test]
    fn decodes_indefinite_array_of_strings() {
        let bytes = [0x9f, 0x61, 0x61, 0x62, 0x62, 0x63, 0xff];
        let value = decode(&bytes).expect("valid input");
        assert_eq!(value, Value::Array(vec!["a".into(), "bc".into()]));
    }

    #[test]
    fn missing_break_is_a_range_error() {
        let bytes = [0x9f, 0x61, 0x61];
        assert!(decode(&bytes).expect_err("truncated input").is_range());
    }

    #[test]
    fn indefinite_text_concatenates_chunks() {
        let bytes = [0x7f, 0x62, b'a', b'b', 0x61, b'c', 0xff];
        assert_eq!(decode(&bytes), Ok(Value::Text("abc".into())));
    }

    #[test]
    fn indefinite_string_rejects_foreign_and_nested_chunks() {
        assert!(matches!(
            decode(&[0x5f, 0x61, b'a', 0xff]),
            Err(CodecError::InvalidMajor { major: 3, .. })
        ));
        assert_eq!(
            decode(&[0x5f, 0x5f, 0xff, 0xff]),
            Err(CodecError::NestedIndefinite)
        );
    }

    #[test]
    fn nesting_is_limited() {
        let mut bytes = vec![0x81; super::MAX_DEPTH];
        bytes.push(0x00);
        assert!(decode(&bytes).is_ok());

        let mut bytes = vec![0x81; super::MAX_DEPTH + 1];
        bytes.push(0x00);
        assert_eq!(
            decode(&bytes),
            Err(CodecError::DepthExceeded(super::MAX_DEPTH))
        );
        assert_eq!(
            decode(&[0xc6; 1024]),
            Err(CodecError::DepthExceeded(super::MAX_DEPTH))
        );
    }

    #[test]
    fn lone_break_is_rejected() {
        assert_eq!(decode(&[0xff]), Err(CodecError::UnexpectedBreak));
        assert_eq!(decode(&[0x81, 0xff]), Err(CodecError::UnexpectedBreak));
    }

    #[test]
    fn reserved_and_unknown_simple_values() {
        assert_eq!(decode(&[0x1c]), Err(CodecError::InvalidLength(28)));
        assert_eq!(decode(&[0xfc]), Err(CodecError::InvalidLength(28)));
        assert_eq!(decode(&[0xe0]), Err(CodecError::UnsupportedSimple(0)));
    }

    #[test]
    fn half_and_single_precision_widen() {
        assert_eq!(decode(&[0xf9, 0x3c, 0x00]), Ok(Value::Float(1.0)));
        assert_eq!(decode(&[0xf9, 0x7c, 0x00]), Ok(Value::Float(f64::INFINITY)));
        assert_eq!(
            decode(&[0xfa, 0x3f, 0xc0, 0x00, 0x00]),
            Ok(Value::Float(1.5))
        );
    }

    #[test]
    fn negative_integers_extend_to_minus_two_pow_64() {
        let bytes = [0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(decode(&bytes), Ok(Value::Integer(-crate::POW_2_64)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(decode(&[0x61, 0xff]), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn decode_all_rejects_trailing_bytes() {
        assert_eq!(decode(&[0x01, 0x02]), Ok(Value::Integer(1)));
        assert_eq!(
            decode_all(&[0x01, 0x02], &DecodeOptions::default()),
            Err(CodecError::TrailingBytes(1))
        );
    }

    #[test]
    fn tag_hook_replaces_tagged_content() {
        let options = DecodeOptions::default().tag(
            7,
            Arc::new(|inner: Value| Ok(Value::Text(format!("table:{}", inner.as_str().unwrap_or(""))))),
        );
        let value = decode_with(&[0xc7, 0x61, b't'], &options).expect("valid input");
        assert_eq!(value, Value::Text("table:t".into()));
    }

    #[test]
    fn replacer_runs_post_order() {
        let options = DecodeOptions::with_replacer(Arc::new(|value: Value| match value {
            Value::Integer(i) => Value::Integer(i * 10),
            Value::Array(items) => Value::Integer(items.len() as i128),
            other => other,
        }));
        let value = decode_with(&[0x82, 0x01, 0x02], &options).expect("valid input");
        assert_eq!(value, Value::Integer(2));
    }
}
