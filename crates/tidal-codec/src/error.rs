use thiserror::Error;

/// Errors returned by the encoder, decoder, and partial builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The reader ran out of bytes.
    #[error("range error: needed {needed} bytes but only {available} remain")]
    Range { needed: usize, available: usize },
    /// A data item used a major type that is illegal where it appeared.
    #[error("invalid major type {major}: {context}")]
    InvalidMajor { major: u8, context: &'static str },
    /// Additional-information values 28..=30 are reserved.
    #[error("invalid length encoding (additional info {0})")]
    InvalidLength(u8),
    /// An indefinite byte/text run contained another indefinite run.
    #[error("nested indefinite-length string")]
    NestedIndefinite,
    /// A break marker appeared outside an indefinite-length item.
    #[error("came across a break which was not intercepted by the decoder")]
    UnexpectedBreak,
    /// An integer outside `-2^64..2^64`, or a length that does not fit in memory.
    #[error("number error: {0}")]
    Number(&'static str),
    /// A text string was not valid UTF-8.
    #[error("text string is not valid utf-8")]
    InvalidUtf8,
    /// A major type 7 value this codec does not represent.
    #[error("unsupported simple value {0}")]
    UnsupportedSimple(u8),
    /// Arrays, maps or tags were nested deeper than the decoder allows.
    #[error("nesting exceeds the maximum depth of {0}")]
    DepthExceeded(usize),
    /// Bytes remained after the top-level value.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    /// A gap was found while encoding without partial mode.
    #[error("encountered a gap without a fill while partial encoding is disabled")]
    PartialDisabled,
    /// A partially encoded value was built while a gap had no value.
    #[error("a gap has no fill and no default value")]
    FillMissing,
}

impl CodecError {
    /// Whether this error was caused by running out of input.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Whether this error is a programmer error from deferred encoding.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialDisabled | Self::FillMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::CodecError;

    #[test]
    fn error_categories_are_distinct() {
        let range = CodecError::Range {
            needed: 4,
            available: 1,
        };
        assert!(range.is_range());
        assert!(!range.is_partial());
        assert!(!CodecError::UnexpectedBreak.is_range());
        assert!(CodecError::FillMissing.is_partial());
        assert!(CodecError::PartialDisabled.is_partial());
    }

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            CodecError::Range {
                needed: 2,
                available: 0
            }
            .to_string(),
            "range error: needed 2 bytes but only 0 remain"
        );
        assert_eq!(
            CodecError::NestedIndefinite.to_string(),
            "nested indefinite-length string"
        );
        assert_eq!(
            CodecError::DepthExceeded(256).to_string(),
            "nesting exceeds the maximum depth of 256"
        );
    }
}
