//! Column type tags and typed values
//!
//! `ColumnType` is resolved once from the table schema and drives coercion.
//! `Value` is what a coerced field becomes and what the row writer receives.

use chrono::NaiveDateTime;
use num_bigint::BigInt;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Declared type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// CQL `int`
    Int32,
    /// CQL `varint`
    VarInt,
    /// CQL `bigint` / `counter`
    Int64,
    /// CQL `double`
    Float64,
    /// CQL `float`
    Float32,
    /// CQL `timestamp`
    Timestamp,
    /// CQL `list<...>`, elements kept as text
    ListText,
    /// CQL `set<...>`, elements kept as text
    SetText,
    /// CQL `map<text, double>`
    MapTextDouble,
    /// Everything else is passed through as text
    Text,
}

impl ColumnType {
    /// Short name used in traces and error messages
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int32 => "int",
            ColumnType::VarInt => "varint",
            ColumnType::Int64 => "bigint",
            ColumnType::Float64 => "double",
            ColumnType::Float32 => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::ListText => "list<text>",
            ColumnType::SetText => "set<text>",
            ColumnType::MapTextDouble => "map<text, double>",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coerced field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    VarInt(BigInt),
    Int64(i64),
    Float64(f64),
    Float32(f32),
    List(Vec<String>),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, f64>),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::VarInt(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
            Value::Set(items) => {
                let items: Vec<&str> = items.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", items.join(", "))
            },
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            },
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Writer encoding: varints as decimal strings, timestamps as epoch
/// milliseconds (the storage engine's timestamp unit), sets as sorted arrays.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::VarInt(v) => serializer.serialize_str(&v.to_string()),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Float64(v) => serializer.serialize_f64(*v),
            Value::Float32(v) => serializer.serialize_f32(*v),
            Value::List(items) => items.serialize(serializer),
            Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            },
            Value::Timestamp(ts) => serializer.serialize_i64(ts.and_utc().timestamp_millis()),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    #[test]
    fn test_display_values() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Int32(7).to_string(), "7");
        assert_eq!(Value::List(vec!["a".into(), "b".into()]).to_string(), "[a, b]");
        assert_eq!(Value::Timestamp(ts()).to_string(), "2020-01-02 03:04:05");

        let map: BTreeMap<String, f64> = [("a".to_string(), 1.5)].into_iter().collect();
        assert_eq!(Value::Map(map).to_string(), "{a: 1.5}");
    }

    #[test]
    fn test_serialize_for_writer() {
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(
            serde_json::to_string(&Value::VarInt(big)).unwrap(),
            "\"123456789012345678901234567890\""
        );
        assert_eq!(serde_json::to_string(&Value::Timestamp(ts())).unwrap(), "1577934245000");
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");

        let set: BTreeSet<String> = ["y".to_string(), "x".to_string()].into_iter().collect();
        assert_eq!(serde_json::to_string(&Value::Set(set)).unwrap(), "[\"x\",\"y\"]");
    }
}
