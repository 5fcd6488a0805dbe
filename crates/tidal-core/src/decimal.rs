use std::fmt;

use tidal_codec::Value;

use crate::error::{expect_tag, CoreError};
use crate::tags::{TAG_FUTURE, TAG_STRING_DECIMAL};

/// An arbitrary-precision decimal kept in its exact textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Validates `[-+]digits[.digits][e[-+]digits]`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let body = input.strip_prefix(['-', '+']).unwrap_or(input);
        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(at) => (&body[..at], Some(&body[at + 1..])),
            None => (body, None),
        };
        let (int, frac) = match mantissa.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (mantissa, None),
        };
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        let exponent_ok = exponent.map_or(true, |e| digits(e.strip_prefix(['-', '+']).unwrap_or(e)));
        if digits(int) && frac.map_or(true, digits) && exponent_ok {
            Ok(Self(input.to_string()))
        } else {
            Err(CoreError::parse("decimal", input))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Decimal> for Value {
    fn from(decimal: Decimal) -> Self {
        Value::tagged(TAG_STRING_DECIMAL, decimal.0)
    }
}

impl TryFrom<&Value> for Decimal {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let inner = expect_tag(value, TAG_STRING_DECIMAL)?;
        Self::parse(inner.as_str().ok_or(CoreError::Shape("decimal text"))?)
    }
}

/// A server-side expression evaluated lazily when the record is read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Future(pub String);

impl fmt::Display for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<future> {{ {} }}", self.0)
    }
}

impl From<Future> for Value {
    fn from(future: Future) -> Self {
        Value::tagged(TAG_FUTURE, future.0)
    }
}

impl TryFrom<&Value> for Future {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let inner = expect_tag(value, TAG_FUTURE)?;
        inner
            .as_str()
            .map(|s| Self(s.to_string()))
            .ok_or(CoreError::Shape("future expression text"))
    }
}
