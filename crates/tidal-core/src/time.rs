use std::fmt;
use std::str::FromStr;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use tidal_codec::Value;

use crate::error::CoreError;
use crate::tags::{
    TAG_CUSTOM_DATETIME, TAG_CUSTOM_DURATION, TAG_STANDARD_DATETIME, TAG_STRING_DURATION,
};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A point in time with nanosecond precision, sent as tag 12 over
/// `[seconds, nanoseconds]` since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Datetime {
    pub seconds: i64,
    /// Always below one second, also for instants before the epoch.
    pub nanos: u32,
}

impl Datetime {
    /// Carries whole seconds out of `nanos`, saturating at `i64::MAX`.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds.saturating_add(i64::from(nanos / NANOS_PER_SEC)),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// `None` when carrying seconds out of `nanos` overflows.
    pub fn checked_new(seconds: i64, nanos: u32) -> Option<Self> {
        Some(Self {
            seconds: seconds.checked_add(i64::from(nanos / NANOS_PER_SEC))?,
            nanos: nanos % NANOS_PER_SEC,
        })
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// `None` when the instant is not representable by the platform clock.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let base = if self.seconds >= 0 {
            UNIX_EPOCH.checked_add(StdDuration::from_secs(self.seconds.unsigned_abs()))?
        } else {
            UNIX_EPOCH.checked_sub(StdDuration::from_secs(self.seconds.unsigned_abs()))?
        };
        base.checked_add(StdDuration::from_nanos(u64::from(self.nanos)))
    }

    /// Parses `YYYY-MM-DDTHH:MM:SS[.fraction](Z|±HH:MM)`.
    pub fn parse_rfc3339(input: &str) -> Result<Self, CoreError> {
        let err = || CoreError::parse("datetime", input);
        let bytes = input.as_bytes();
        if bytes.len() < 20 || bytes[4] != b'-' || bytes[7] != b'-' || bytes[13] != b':' || bytes[16] != b':' {
            return Err(err());
        }
        if !matches!(bytes[10], b'T' | b't' | b' ') {
            return Err(err());
        }

        let num = |range: std::ops::Range<usize>| -> Result<i64, CoreError> {
            let part = input.get(range).ok_or_else(err)?;
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            part.parse::<i64>().map_err(|_| err())
        };
        let (year, month, day) = (num(0..4)?, num(5..7)?, num(8..10)?);
        let (hour, minute, second) = (num(11..13)?, num(14..16)?, num(17..19)?);
        if !(1..=12).contains(&month)
            || day < 1
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 60
        {
            return Err(err());
        }

        let mut rest = &input[19..];
        let mut nanos = 0_u32;
        if let Some(fraction) = rest.strip_prefix('.') {
            let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return Err(err());
            }
            for (i, b) in fraction.bytes().take(digits).enumerate() {
                if i < 9 {
                    nanos = nanos * 10 + u32::from(b - b'0');
                }
            }
            for _ in digits..9 {
                nanos *= 10;
            }
            rest = &fraction[digits..];
        }

        let offset = match rest.as_bytes() {
            [b'Z' | b'z'] => 0,
            [sign @ (b'+' | b'-'), h1, h2, b':', m1, m2] => {
                let digit = |b: &u8| -> Result<i64, CoreError> {
                    if b.is_ascii_digit() {
                        Ok(i64::from(b - b'0'))
                    } else {
                        Err(err())
                    }
                };
                let minutes = (digit(h1)? * 10 + digit(h2)?) * 60 + digit(m1)? * 10 + digit(m2)?;
                if *sign == b'-' {
                    -minutes * 60
                } else {
                    minutes * 60
                }
            }
            _ => return Err(err()),
        };

        let days = days_from_civil(year, month, day);
        let seconds = days * 86_400 + hour * 3_600 + minute * 60 + second - offset;
        Ok(Self { seconds, nanos })
    }
}

impl From<SystemTime> for Datetime {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self {
                seconds: since.as_secs() as i64,
                nanos: since.subsec_nanos(),
            },
            Err(before) => {
                let before = before.duration();
                let mut seconds = -(before.as_secs() as i64);
                let mut nanos = before.subsec_nanos();
                if nanos > 0 {
                    seconds -= 1;
                    nanos = NANOS_PER_SEC - nanos;
                }
                Self { seconds, nanos }
            }
        }
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.seconds.div_euclid(86_400);
        let secs = self.seconds.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        write!(
            f,
            "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}",
            secs / 3_600,
            secs % 3_600 / 60,
            secs % 60
        )?;
        if self.nanos > 0 {
            let fraction = format!("{:09}", self.nanos);
            write!(f, ".{}", fraction.trim_end_matches('0'))?;
        }
        f.write_str("Z")
    }
}

impl FromStr for Datetime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_rfc3339(s)
    }
}

impl From<Datetime> for Value {
    fn from(dt: Datetime) -> Self {
        Value::tagged(
            TAG_CUSTOM_DATETIME,
            Value::Array(vec![Value::from(dt.seconds), Value::from(dt.nanos)]),
        )
    }
}

impl TryFrom<&Value> for Datetime {
    type Error = CoreError;

    /// Accepts the compact (12) and the RFC 3339 text (0) tag.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.as_tagged() {
            Some((TAG_CUSTOM_DATETIME, inner)) => {
                let (seconds, nanos) = compact_pair(inner, "[seconds, nanoseconds]")?;
                let nanos = u32::try_from(nanos).map_err(|_| CoreError::Shape("nanoseconds"))?;
                Self::checked_new(seconds, nanos).ok_or(CoreError::Shape("datetime in range"))
            }
            Some((TAG_STANDARD_DATETIME, inner)) => {
                Self::parse_rfc3339(inner.as_str().ok_or(CoreError::Shape("datetime text"))?)
            }
            Some((found, _)) => Err(CoreError::UnexpectedTag {
                expected: TAG_CUSTOM_DATETIME,
                found,
            }),
            None => Err(CoreError::Shape("tagged datetime")),
        }
    }
}

/// Reads `[]`, `[a]` or `[a, b]` with missing parts as zero.
fn compact_pair(inner: &Value, shape: &'static str) -> Result<(i64, i64), CoreError> {
    let parts = inner.as_array().ok_or(CoreError::Shape(shape))?;
    if parts.len() > 2 {
        return Err(CoreError::Shape(shape));
    }
    let part = |i: usize| -> Result<i64, CoreError> {
        match parts.get(i) {
            None => Ok(0),
            Some(v) => v.as_i64().ok_or(CoreError::Shape(shape)),
        }
    };
    Ok((part(0)?, part(1)?))
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

/// Unit suffixes, longest first so `ms` wins over `m`.
const UNITS: [(&str, u128); 10] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
    ("d", 86_400_000_000_000),
    ("w", 604_800_000_000_000),
];

/// Printed from the largest unit down.
const DISPLAY_UNITS: [(&str, u128); 8] = [
    ("w", 604_800_000_000_000),
    ("d", 86_400_000_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// A non-negative span of time, sent as tag 14 in compact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Duration(pub StdDuration);

impl Duration {
    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self(StdDuration::new(seconds, nanos))
    }

    /// Parses unit strings such as `1h30m` or `250ms`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        if input.is_empty() {
            return Err(CoreError::parse("duration", input));
        }
        let mut total: u128 = 0;
        let mut rest = input;
        while !rest.is_empty() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return Err(CoreError::parse("duration", input));
            }
            let amount: u128 = rest[..digits]
                .parse()
                .map_err(|_| CoreError::parse("duration", input))?;
            rest = &rest[digits..];

            let (unit, size) = UNITS
                .iter()
                .filter(|(unit, _)| rest.starts_with(unit))
                .max_by_key(|(unit, _)| unit.len())
                .ok_or_else(|| CoreError::parse("duration unit", rest))?;
            rest = &rest[unit.len()..];
            total = amount
                .checked_mul(*size)
                .and_then(|n| total.checked_add(n))
                .ok_or_else(|| CoreError::parse("duration", input))?;
        }

        let seconds = u64::try_from(total / u128::from(NANOS_PER_SEC))
            .map_err(|_| CoreError::parse("duration", input))?;
        Ok(Self::new(seconds, (total % u128::from(NANOS_PER_SEC)) as u32))
    }

    /// `[seconds, nanoseconds]` with trailing zero parts dropped.
    pub fn to_compact(&self) -> Vec<Value> {
        let (secs, nanos) = (self.0.as_secs(), self.0.subsec_nanos());
        if nanos > 0 {
            vec![Value::from(secs), Value::from(nanos)]
        } else if secs > 0 {
            vec![Value::from(secs)]
        } else {
            Vec::new()
        }
    }

    pub fn from_compact(inner: &Value) -> Result<Self, CoreError> {
        let (secs, nanos) = compact_pair(inner, "[seconds, nanoseconds]")?;
        let secs = u64::try_from(secs).map_err(|_| CoreError::Shape("non-negative seconds"))?;
        let nanos = u64::try_from(nanos).map_err(|_| CoreError::Shape("non-negative nanoseconds"))?;
        Ok(Self(
            StdDuration::from_secs(secs).saturating_add(StdDuration::from_nanos(nanos)),
        ))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut left = self.0.as_nanos();
        if left == 0 {
            return f.write_str("0ns");
        }
        for (unit, size) in DISPLAY_UNITS {
            let count = left / size;
            if count > 0 {
                write!(f, "{count}{unit}")?;
                left %= size;
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<StdDuration> for Duration {
    fn from(duration: StdDuration) -> Self {
        Self(duration)
    }
}

impl From<Duration> for StdDuration {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

impl From<Duration> for Value {
    fn from(duration: Duration) -> Self {
        Value::tagged(TAG_CUSTOM_DURATION, Value::Array(duration.to_compact()))
    }
}

impl TryFrom<&Value> for Duration {
    type Error = CoreError;

    /// Accepts the compact (14) and the unit-string (13) tag.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.as_tagged() {
            Some((TAG_CUSTOM_DURATION, inner)) => Self::from_compact(inner),
            Some((TAG_STRING_DURATION, inner)) => {
                Self::parse(inner.as_str().ok_or(CoreError::Shape("duration text"))?)
            }
            Some((found, _)) => Err(CoreError::UnexpectedTag {
                expected: TAG_CUSTOM_DURATION,
                found,
            }),
            None => Err(CoreError::Shape("tagged duration")),
        }
    }
}
