use std::fmt;

use tidal_codec::Value;

use crate::error::{expect_tag, CoreError};
use crate::record::escape_ident;
use crate::tags::{TAG_BOUND_EXCLUDED, TAG_BOUND_INCLUDED, TAG_RANGE};

/// One end of a [`Range`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Bound {
    Included(Value),
    Excluded(Value),
    #[default]
    Unbounded,
}

impl Bound {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Included(v) | Self::Excluded(v) => Some(v),
            Self::Unbounded => None,
        }
    }
}

impl From<Bound> for Value {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Included(v) => Value::tagged(TAG_BOUND_INCLUDED, v),
            Bound::Excluded(v) => Value::tagged(TAG_BOUND_EXCLUDED, v),
            Bound::Unbounded => Value::Null,
        }
    }
}

impl TryFrom<&Value> for Bound {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null | Value::Undefined => Ok(Self::Unbounded),
            Value::Tagged(TAG_BOUND_INCLUDED, inner) => Ok(Self::Included((**inner).clone())),
            Value::Tagged(TAG_BOUND_EXCLUDED, inner) => Ok(Self::Excluded((**inner).clone())),
            Value::Tagged(found, _) => Err(CoreError::UnexpectedTag {
                expected: TAG_BOUND_INCLUDED,
                found: *found,
            }),
            _ => Err(CoreError::Shape("range bound")),
        }
    }
}

/// A range value, sent as tag 49 over `[beg, end]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    pub beg: Bound,
    pub end: Bound,
}

impl Range {
    pub fn new(beg: Bound, end: Bound) -> Self {
        Self { beg, end }
    }
}

impl From<Range> for Value {
    fn from(range: Range) -> Self {
        Value::tagged(
            TAG_RANGE,
            Value::Array(vec![range.beg.into(), range.end.into()]),
        )
    }
}

impl TryFrom<&Value> for Range {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match expect_tag(value, TAG_RANGE)?.as_array() {
            Some([beg, end]) => Ok(Self {
                beg: Bound::try_from(beg)?,
                end: Bound::try_from(end)?,
            }),
            _ => Err(CoreError::Shape("[beg, end] pair")),
        }
    }
}

impl TryFrom<Value> for Range {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

fn fmt_bound_value(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Integer(i) => write!(f, "{i}"),
        Value::Float(x) => write!(f, "{x}"),
        Value::Text(s) => f.write_str(&escape_ident(s)),
        other => write!(f, "{other:?}"),
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.beg.value() {
            fmt_bound_value(v, f)?;
        }
        if matches!(self.beg, Bound::Excluded(_)) {
            f.write_str(">")?;
        }
        f.write_str("..")?;
        if matches!(self.end, Bound::Included(_)) {
            f.write_str("=")?;
        }
        if let Some(v) = self.end.value() {
            fmt_bound_value(v, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bound, Range};
    use crate::error::CoreError;
    use tidal_codec::Value;

    #[test]
    fn unbounded_ends_encode_as_null() {
        let range = Range::new(Bound::Unbounded, Bound::Included(Value::from(5_i64)));
        let value = Value::from(range.clone());
        assert_eq!(
            value,
            Value::tagged(
                49,
                Value::Array(vec![Value::Null, Value::tagged(50, 5_i64)])
            )
        );
        assert_eq!(Range::try_from(&value), Ok(range));
    }

    #[test]
    fn display_marks_exclusive_and_inclusive_ends() {
        let range = Range::new(
            Bound::Excluded(Value::from(1_i64)),
            Bound::Included(Value::from(3_i64)),
        );
        assert_eq!(range.to_string(), "1>..=3");
        assert_eq!(Range::default().to_string(), "..");
    }

    #[test]
    fn foreign_bound_tag_is_rejected() {
        let value = Value::tagged(49, Value::Array(vec![Value::tagged(7, "x"), Value::Null]));
        assert_eq!(
            Range::try_from(&value),
            Err(CoreError::UnexpectedTag {
                expected: 50,
                found: 7
            })
        );
    }
}
