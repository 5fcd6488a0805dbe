use thiserror::Error;

/// Failure converting between [`Value`](tidal_codec::Value) and a domain type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The value is not tagged with what the target type expects.
    #[error("expected tag {expected}, found {found}")]
    UnexpectedTag { expected: u64, found: u64 },
    /// The tagged content has the wrong structure.
    #[error("invalid shape: expected {0}")]
    Shape(&'static str),
    /// Malformed textual representation.
    #[error("invalid {kind}: {input}")]
    Parse { kind: &'static str, input: String },
    #[error("codec error: {0}")]
    Codec(#[from] tidal_codec::CodecError),
}

impl CoreError {
    pub(crate) fn parse(kind: &'static str, input: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            input: input.into(),
        }
    }
}

/// Unwraps `value` as tag `expected`.
pub(crate) fn expect_tag(
    value: &tidal_codec::Value,
    expected: u64,
) -> Result<&tidal_codec::Value, CoreError> {
    match value.as_tagged() {
        Some((tag, inner)) if tag == expected => Ok(inner),
        Some((found, _)) => Err(CoreError::UnexpectedTag { expected, found }),
        None => Err(CoreError::Shape("tagged value")),
    }
}

#[cfg(test)]
mod tests {
    use super::{expect_tag, CoreError};
    use tidal_codec::Value;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            CoreError::UnexpectedTag {
                expected: 7,
                found: 8
            }
            .to_string(),
            "expected tag 7, found 8"
        );
        assert_eq!(
            CoreError::parse("uuid", "nope").to_string(),
            "invalid uuid: nope"
        );
    }

    #[test]
    fn expect_tag_checks_number_and_shape() {
        let value = Value::tagged(7, "person");
        assert_eq!(expect_tag(&value, 7), Ok(&Value::from("person")));
        assert_eq!(
            expect_tag(&value, 8),
            Err(CoreError::UnexpectedTag {
                expected: 8,
                found: 7
            })
        );
        assert_eq!(
            expect_tag(&Value::Null, 7),
            Err(CoreError::Shape("tagged value"))
        );
    }
}
