use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::CodecError;
use crate::gap::Fill;
use crate::partial::PartiallyEncoded;
use crate::value::Value;
use crate::writer::{Major, Writer};
use crate::POW_2_64;

/// Substitution hook run on every value before built-in dispatch.
///
/// Returning `Some` encodes the replacement instead of the input; the
/// replacement's children are visited (and replaced) in turn.
pub type Replacer = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Encoder inputs besides the value itself.
#[derive(Clone, Default)]
pub struct EncodeOptions<'a> {
    pub replacer: Option<Replacer>,
    pub fills: &'a [Fill],
}

impl<'a> EncodeOptions<'a> {
    pub fn with_replacer(replacer: Replacer) -> Self {
        Self {
            replacer: Some(replacer),
            fills: &[],
        }
    }

    pub fn fills(mut self, fills: &'a [Fill]) -> Self {
        self.fills = fills;
        self
    }
}

/// Encodes a complete value with no hooks.
pub fn encode(value: &Value) -> Result<Bytes, CodecError> {
    encode_with(value, &EncodeOptions::default())
}

/// Encodes a complete value; every gap must be resolved by `options.fills`.
pub fn encode_with(value: &Value, options: &EncodeOptions<'_>) -> Result<Bytes, CodecError> {
    let mut writer = Writer::new();
    encode_into(
        &mut writer,
        value,
        options.replacer.as_ref(),
        options.fills,
        false,
    )?;
    writer.into_bytes()
}

/// Encodes a value that may contain unresolved gaps.
pub fn encode_partial(
    value: &Value,
    options: &EncodeOptions<'_>,
) -> Result<PartiallyEncoded, CodecError> {
    let mut writer = Writer::new();
    encode_into(
        &mut writer,
        value,
        options.replacer.as_ref(),
        options.fills,
        true,
    )?;
    Ok(writer.into_partial(options.replacer.clone()))
}

pub(crate) fn encode_into(
    writer: &mut Writer,
    value: &Value,
    replacer: Option<&Replacer>,
    fills: &[Fill],
    partial: bool,
) -> Result<(), CodecError> {
    let mut encoder = Encoder {
        writer,
        replacer,
        fills,
        fill_index: fills.iter().map(|f| (f.gap.id(), &f.value)).collect(),
        partial,
    };
    encoder.value(value)
}

struct Encoder<'w, 'f> {
    writer: &'w mut Writer,
    replacer: Option<&'f Replacer>,
    fills: &'f [Fill],
    fill_index: HashMap<u64, &'f Value>,
    partial: bool,
}

impl Encoder<'_, '_> {
    fn value(&mut self, input: &Value) -> Result<(), CodecError> {
        let replaced = self.replacer.and_then(|replace| replace(input));
        let value = replaced.as_ref().unwrap_or(input);

        match value {
            Value::Undefined => self.writer.write_u8(0xf7),
            Value::Null => self.writer.write_u8(0xf6),
            Value::Bool(true) => self.writer.write_u8(0xf5),
            Value::Bool(false) => self.writer.write_u8(0xf4),
            Value::Integer(i) => self.integer(*i)?,
            Value::Float(f) => {
                // Always 64-bit: narrower widths would lose precision.
                self.writer.write_u8(0xfb);
                self.writer.write_f64(*f);
            }
            Value::Bytes(bytes) => {
                self.writer.write_major(Major::Bytes, bytes.len() as u64);
                self.writer.write_bytes(bytes);
            }
            Value::Text(text) => {
                self.writer.write_major(Major::Text, text.len() as u64);
                self.writer.write_bytes(text.as_bytes());
            }
            Value::Array(items) => {
                self.writer.write_major(Major::Array, items.len() as u64);
                for item in items {
                    self.value(item)?;
                }
            }
            Value::Map(entries) => {
                self.writer.write_major(Major::Map, entries.len() as u64);
                for (key, item) in entries {
                    self.value(key)?;
                    self.value(item)?;
                }
            }
            Value::Tagged(tag, inner) => {
                self.writer.write_major(Major::Tag, *tag);
                self.value(inner)?;
            }
            Value::Encoded(bytes) => self.writer.write_bytes(bytes),
            Value::Gap(gap) => match self.fill_index.get(&gap.id()).copied() {
                Some(fill) => self.value(fill)?,
                None if self.partial => self.writer.chunk(gap.clone()),
                None => return Err(CodecError::PartialDisabled),
            },
            Value::Partial(nested) => {
                if self.partial {
                    let rebuilt = nested.build_partial(self.fills)?;
                    self.writer.write_partially_encoded(&rebuilt);
                } else {
                    let bytes = nested.build(self.fills)?;
                    self.writer.write_bytes(&bytes);
                }
            }
        }
        Ok(())
    }

    fn integer(&mut self, value: i128) -> Result<(), CodecError> {
        if value >= 0 {
            if value >= POW_2_64 {
                return Err(CodecError::Number("integer too big to be encoded"));
            }
            self.writer.write_major(Major::Unsigned, value as u64);
        } else {
            if value < -POW_2_64 {
                return Err(CodecError::Number("integer too small to be encoded"));
            }
            self.writer.write_major(Major::Negative, (-(value + 1)) as u64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{encode, encode_partial, encode_with, EncodeOptions};
    use crate::error::CodecError;
    use crate::gap::Gap;
    use crate::value::Value;
    use crate::POW_2_64;

    fn hex_of(value: &Value) -> Vec<u8> {
        encode(value).expect("value should encode").to_vec()
    }

    #[test]
    fn sentinels_are_single_bytes() {
        assert_eq!(hex_of(&Value::Undefined), vec![0xf7]);
        assert_eq!(hex_of(&Value::Null), vec![0xf6]);
        assert_eq!(hex_of(&Value::Bool(true)), vec![0xf5]);
        assert_eq!(hex_of(&Value::Bool(false)), vec![0xf4]);
    }

    #[test]
    fn integers_use_minimal_width() {
        assert_eq!(hex_of(&Value::Integer(10)), vec![0x0a]);
        assert_eq!(hex_of(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(hex_of(&Value::Integer(-25)), vec![0x38, 0x18]);
        assert_eq!(hex_of(&Value::Integer(1000)), vec![0x19, 0x03, 0xe8]);
        assert_eq!(
            hex_of(&Value::Integer(POW_2_64 - 1)),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            hex_of(&Value::Integer(-POW_2_64)),
            vec![0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn out_of_range_integers_fail() {
        assert!(matches!(
            encode(&Value::Integer(POW_2_64)),
            Err(CodecError::Number(_))
        ));
        assert!(matches!(
            encode(&Value::Integer(-POW_2_64 - 1)),
            Err(CodecError::Number(_))
        ));
    }

    #[test]
    fn floats_always_use_eight_bytes() {
        let mut expected = vec![0xfb];
        expected.extend_from_slice(&1.5_f64.to_be_bytes());
        assert_eq!(hex_of(&Value::Float(1.5)), expected);
        assert_eq!(hex_of(&Value::Float(0.0)).len(), 9);
    }

    #[test]
    fn replacer_runs_before_dispatch_on_children() {
        let replacer: super::Replacer = Arc::new(|v: &Value| match v {
            Value::Undefined => Some(Value::tagged(6, Value::Null)),
            _ => None,
        });
        let options = EncodeOptions::with_replacer(replacer);
        let encoded = encode_with(&Value::Array(vec![Value::Undefined]), &options)
            .expect("value should encode");
        assert_eq!(&encoded[..], &[0x81, 0xc6, 0xf6]);
    }

    #[test]
    fn gap_without_partial_mode_fails() {
        let value = Value::Array(vec![Gap::new().into()]);
        assert_eq!(encode(&value), Err(CodecError::PartialDisabled));
    }

    #[test]
    fn gap_with_fill_encodes_fill_inline() {
        let gap = Gap::new();
        let fills = [gap.fill(5_u8)];
        let options = EncodeOptions::default().fills(&fills);
        let encoded = encode_with(&Value::Array(vec![gap.into()]), &options)
            .expect("filled gap should encode");
        assert_eq!(&encoded[..], &[0x81, 0x05]);
    }

    #[test]
    fn encoded_values_are_spliced_verbatim() {
        let inner = encode(&Value::Text("a".into())).expect("text should encode");
        let encoded =
            encode(&Value::Array(vec![Value::Encoded(inner)])).expect("array should encode");
        assert_eq!(&encoded[..], &[0x81, 0x61, 0x61]);
    }

    #[test]
    fn partial_encode_records_gap_chunks() {
        let gap = Gap::new();
        let partial = encode_partial(
            &Value::map([("k", Value::Gap(gap.clone()))]),
            &EncodeOptions::default(),
        )
        .expect("partial encode should succeed");
        assert_eq!(partial.chunks().len(), 1);
        assert_eq!(&partial.chunks()[0].0[..], &[0xa1, 0x61, b'k']);
        assert!(partial.end().is_empty());
    }
}
