use std::fmt;
use std::str::FromStr;

use tidal_codec::Value;

use crate::error::CoreError;
use crate::tags::{TAG_STANDARD_UUID, TAG_STRING_UUID};

/// Byte offsets of the hyphens in the 36-character text form.
const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// A 128-bit UUID, sent as tag 37 over 16 raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses the hyphenated (8-4-4-4-12) or bare 32-digit hex form.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let digits: String = match input.len() {
            32 => input.to_string(),
            36 => {
                let bytes = input.as_bytes();
                let placed = HYPHENS.iter().all(|&at| bytes[at] == b'-');
                let digits: String = input.chars().filter(|c| *c != '-').collect();
                if !placed || digits.len() != 32 {
                    return Err(CoreError::parse("uuid", input));
                }
                digits
            }
            _ => return Err(CoreError::parse("uuid", input)),
        };

        let mut out = [0_u8; 16];
        hex::decode_to_slice(&digits, &mut out).map_err(|_| CoreError::parse("uuid", input))?;
        Ok(Self(out))
    }
}

impl FromStr for Uuid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &digits[..8],
            &digits[8..12],
            &digits[12..16],
            &digits[16..20],
            &digits[20..]
        )
    }
}

impl From<Uuid> for Value {
    fn from(uuid: Uuid) -> Self {
        Value::tagged(TAG_STANDARD_UUID, Value::Bytes(uuid.0.to_vec()))
    }
}

impl TryFrom<&Value> for Uuid {
    type Error = CoreError;

    /// Accepts both the binary (37) and the text (9) tag.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.as_tagged() {
            Some((TAG_STANDARD_UUID, inner)) => {
                let bytes = inner.as_bytes().ok_or(CoreError::Shape("16 uuid bytes"))?;
                <[u8; 16]>::try_from(bytes)
                    .map(Self)
                    .map_err(|_| CoreError::Shape("16 uuid bytes"))
            }
            Some((TAG_STRING_UUID, inner)) => {
                Self::parse(inner.as_str().ok_or(CoreError::Shape("uuid text"))?)
            }
            Some((found, _)) => Err(CoreError::UnexpectedTag {
                expected: TAG_STANDARD_UUID,
                found,
            }),
            None => Err(CoreError::Shape("tagged uuid")),
        }
    }
}

impl TryFrom<Value> for Uuid {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::Uuid;
    use crate::error::CoreError;
    use tidal_codec::Value;

    const TEXT: &str = "a1b2c3d4-0102-4304-8506-0708090a0b0c";

    #[test]
    fn parse_and_display_round_trip() {
        let uuid = Uuid::parse(TEXT).expect("valid uuid");
        assert_eq!(uuid.as_bytes()[0], 0xa1);
        assert_eq!(uuid.to_string(), TEXT);
        assert_eq!(
            Uuid::parse(&TEXT.replace('-', "")).expect("bare form"),
            uuid
        );
    }

    #[test]
    fn malformed_text_is_rejected() {
        for bad in ["", "a1b2", "g1b2c3d4-0102-4304-8506-0708090a0b0c", "a1b2c3d4-0102-4304-8506-0708090a0b0c0d"] {
            assert!(matches!(Uuid::parse(bad), Err(CoreError::Parse { .. })), "{bad}");
        }
    }

    #[test]
    fn hyphens_must_sit_between_groups() {
        for bad in [
            "a1b2-c3d40102-4304-8506-0708090a0b0c",
            "a1b2c3d4-0102-4304-85060708-090a0b0c",
            "a1b2c3d4-0102-4304-8506-0708090a0b-c",
            "a1b2c3d4-0102-43048506-0708090a0b0c",
        ] {
            assert!(matches!(Uuid::parse(bad), Err(CoreError::Parse { .. })), "{bad}");
        }
    }

    #[test]
    fn accepts_binary_and_text_tags() {
        let uuid = Uuid::parse(TEXT).expect("valid uuid");
        let binary = Value::from(uuid);
        assert_eq!(Uuid::try_from(&binary), Ok(uuid));
        assert_eq!(Uuid::try_from(Value::tagged(9, TEXT)), Ok(uuid));
        assert_eq!(
            Uuid::try_from(Value::tagged(37, Value::Bytes(vec![1, 2]))),
            Err(CoreError::Shape("16 uuid bytes"))
        );
    }
}
