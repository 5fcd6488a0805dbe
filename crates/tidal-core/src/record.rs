use std::fmt;

use tidal_codec::Value;

use crate::error::{expect_tag, CoreError};
use crate::range::{Bound, Range};
use crate::tags::{TAG_RANGE, TAG_RECORDID, TAG_TABLE};
use crate::uuid::Uuid;

/// A table name, sent as tag 7.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table(pub String);

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape_ident(&self.0))
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::tagged(TAG_TABLE, table.0)
    }
}

impl TryFrom<&Value> for Table {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let inner = expect_tag(value, TAG_TABLE)?;
        inner
            .as_str()
            .map(|name| Self(name.to_string()))
            .ok_or(CoreError::Shape("table name text"))
    }
}

/// The key half of a record id.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordIdKey {
    Text(String),
    Integer(i64),
    Uuid(Uuid),
    Array(Vec<Value>),
    Object(Vec<(Value, Value)>),
}

impl From<&str> for RecordIdKey {
    fn from(key: &str) -> Self {
        Self::Text(key.to_string())
    }
}

impl From<String> for RecordIdKey {
    fn from(key: String) -> Self {
        Self::Text(key)
    }
}

impl From<i64> for RecordIdKey {
    fn from(key: i64) -> Self {
        Self::Integer(key)
    }
}

impl From<Uuid> for RecordIdKey {
    fn from(key: Uuid) -> Self {
        Self::Uuid(key)
    }
}

impl From<RecordIdKey> for Value {
    fn from(key: RecordIdKey) -> Self {
        match key {
            RecordIdKey::Text(s) => Value::Text(s),
            RecordIdKey::Integer(i) => Value::from(i),
            RecordIdKey::Uuid(u) => Value::from(u),
            RecordIdKey::Array(items) => Value::Array(items),
            RecordIdKey::Object(entries) => Value::Map(entries),
        }
    }
}

impl TryFrom<&Value> for RecordIdKey {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(Self::Text(s.clone())),
            Value::Integer(_) => value
                .as_i64()
                .map(Self::Integer)
                .ok_or(CoreError::Shape("record key within i64")),
            Value::Array(items) => Ok(Self::Array(items.clone())),
            Value::Map(entries) => Ok(Self::Object(entries.clone())),
            Value::Tagged(..) => Uuid::try_from(value).map(Self::Uuid),
            _ => Err(CoreError::Shape("record key")),
        }
    }
}

impl fmt::Display for RecordIdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(&escape_ident(s)),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Uuid(u) => write!(f, "u\"{u}\""),
            Self::Array(items) => write!(f, "{items:?}"),
            Self::Object(entries) => write!(f, "{entries:?}"),
        }
    }
}

/// A `table:key` record identifier, sent as tag 8 over `[table, key]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordId {
    pub table: String,
    pub key: RecordIdKey,
}

impl RecordId {
    pub fn new(table: impl Into<String>, key: impl Into<RecordIdKey>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", escape_ident(&self.table), self.key)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::tagged(
            TAG_RECORDID,
            Value::Array(vec![Value::Text(id.table), id.key.into()]),
        )
    }
}

fn record_parts(value: &Value) -> Result<(&str, &Value), CoreError> {
    match expect_tag(value, TAG_RECORDID)?.as_array() {
        Some([table, key]) => table
            .as_str()
            .map(|t| (t, key))
            .ok_or(CoreError::Shape("record table text")),
        _ => Err(CoreError::Shape("[table, key] pair")),
    }
}

impl TryFrom<&Value> for RecordId {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let (table, key) = record_parts(value)?;
        if matches!(key.as_tagged(), Some((TAG_RANGE, _))) {
            return Err(CoreError::Shape("single record key, found a range"));
        }
        Ok(Self {
            table: table.to_string(),
            key: RecordIdKey::try_from(key)?,
        })
    }
}

impl TryFrom<Value> for RecordId {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

/// A record id kept in its textual form and parsed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRecordId(pub String);

impl From<StringRecordId> for Value {
    fn from(id: StringRecordId) -> Self {
        Value::tagged(TAG_RECORDID, id.0)
    }
}

/// A span of record ids within one table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordIdRange {
    pub table: String,
    pub beg: Bound,
    pub end: Bound,
}

impl fmt::Display for RecordIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", escape_ident(&self.table))?;
        let range = Range {
            beg: self.beg.clone(),
            end: self.end.clone(),
        };
        fmt::Display::fmt(&range, f)
    }
}

impl From<RecordIdRange> for Value {
    fn from(range: RecordIdRange) -> Self {
        let inner = Range {
            beg: range.beg,
            end: range.end,
        };
        Value::tagged(
            TAG_RECORDID,
            Value::Array(vec![Value::Text(range.table), inner.into()]),
        )
    }
}

impl TryFrom<&Value> for RecordIdRange {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let (table, key) = record_parts(value)?;
        let range = Range::try_from(key)?;
        Ok(Self {
            table: table.to_string(),
            beg: range.beg,
            end: range.end,
        })
    }
}

/// Quotes identifiers that are not plain `[A-Za-z0-9_]` or look numeric.
pub fn escape_ident(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    let numeric = !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_digit());
    if plain && !numeric {
        ident.to_string()
    } else {
        format!("⟨{}⟩", ident.replace('⟩', "\\⟩"))
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_ident, RecordId, RecordIdKey, RecordIdRange, Table};
    use crate::error::CoreError;
    use crate::range::Bound;
    use tidal_codec::Value;

    #[test]
    fn record_id_round_trips_through_tag_8() {
        let id = RecordId::new("person", "tobie");
        let value = Value::from(id.clone());
        assert_eq!(
            value,
            Value::tagged(8, Value::Array(vec!["person".into(), "tobie".into()]))
        );
        assert_eq!(RecordId::try_from(&value), Ok(id));
    }

    #[test]
    fn record_keys_accept_every_shape() {
        let object = Value::map([("a", 1_u8)]);
        let key = RecordIdKey::try_from(&object).expect("object key");
        assert!(matches!(key, RecordIdKey::Object(_)));
        assert_eq!(RecordIdKey::try_from(&Value::from(5_i64)), Ok(RecordIdKey::Integer(5)));
        assert!(RecordIdKey::try_from(&Value::Null).is_err());
    }

    #[test]
    fn display_escapes_identifiers() {
        assert_eq!(RecordId::new("person", "tobie").to_string(), "person:tobie");
        assert_eq!(RecordId::new("person", 42_i64).to_string(), "person:42");
        assert_eq!(RecordId::new("person", "123").to_string(), "person:⟨123⟩");
        assert_eq!(escape_ident("two words"), "⟨two words⟩");
        assert_eq!(Table::new("user_log").to_string(), "user_log");
    }

    #[test]
    fn range_keys_decode_as_record_id_range() {
        let range = RecordIdRange {
            table: "person".into(),
            beg: Bound::Included(Value::from(1_i64)),
            end: Bound::Excluded(Value::from(10_i64)),
        };
        let value = Value::from(range.clone());
        assert_eq!(RecordIdRange::try_from(&value), Ok(range.clone()));
        assert_eq!(
            RecordId::try_from(&value),
            Err(CoreError::Shape("single record key, found a range"))
        );
        assert_eq!(range.to_string(), "person:1..10");
    }

    #[test]
    fn table_requires_tag_7() {
        assert_eq!(
            Table::try_from(&Value::tagged(7, "person")),
            Ok(Table::new("person"))
        );
        assert!(Table::try_from(&Value::from("person")).is_err());
    }
}
