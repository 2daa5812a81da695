//! Type coercion of raw fields
//!
//! Converts one raw field into a [`Value`] for its declared [`ColumnType`].
//! An empty field is always `Null`. Numeric and map failures are errors;
//! an unparsable timestamp becomes `Null` instead. Timestamps only need a
//! matching `yyyy-MM-dd HH:mm:ss` prefix.

use crate::types::{ColumnType, Value};
use chrono::NaiveDateTime;
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};
use std::num::IntErrorKind;
use thiserror::Error;

/// `yyyy-MM-dd HH:mm:ss`, 24-hour clock
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default separator between members of a flattened collection
pub const DEFAULT_LIST_DELIMITER: char = '\u{2}';

const MAP_KEY_QUOTES: &[char] = &['\'', '"'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("'{raw}' is not a valid {expected}")]
    NotNumeric { raw: String, expected: ColumnType },

    #[error("'{raw}' is out of range for {expected}")]
    IntegerOverflow { raw: String, expected: ColumnType },

    #[error("malformed {expected} value '{raw}': {reason}")]
    MalformedComposite {
        raw: String,
        expected: ColumnType,
        reason: String,
    },
}

/// Coerces raw fields; holds only the collection delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coercer {
    list_delimiter: char,
}

impl Default for Coercer {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_DELIMITER)
    }
}

impl Coercer {
    pub fn new(list_delimiter: char) -> Self {
        Self { list_delimiter }
    }

    pub fn list_delimiter(&self) -> char {
        self.list_delimiter
    }

    pub fn coerce(&self, raw: &str, column_type: ColumnType) -> Result<Value, CoercionError> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }

        let value = match column_type {
            ColumnType::Int32 => Value::Int32(parse_integer(raw, column_type)?),
            ColumnType::VarInt => Value::VarInt(parse_varint(raw, column_type)?),
            ColumnType::Int64 => Value::Int64(parse_integer(raw, column_type)?),
            ColumnType::Float64 => Value::Float64(parse_float(raw, column_type)?),
            ColumnType::Float32 => Value::Float32(parse_float(raw, column_type)?),
            ColumnType::ListText => Value::List(self.split_members(raw).collect()),
            ColumnType::SetText => Value::Set(self.split_members(raw).collect::<BTreeSet<_>>()),
            ColumnType::MapTextDouble => Value::Map(self.parse_map(raw)?),
            ColumnType::Timestamp => parse_timestamp(raw).map_or(Value::Null, Value::Timestamp),
            ColumnType::Text => Value::Text(raw.to_string()),
        };

        Ok(value)
    }

    fn split_members<'a>(&self, raw: &'a str) -> impl Iterator<Item = String> + 'a {
        raw.split(self.list_delimiter).map(str::to_string)
    }

    /// `{k1: v1<d>k2: v2}` with one bracket character stripped at each end
    fn parse_map(&self, raw: &str) -> Result<BTreeMap<String, f64>, CoercionError> {
        let malformed = |reason: &str| CoercionError::MalformedComposite {
            raw: raw.to_string(),
            expected: ColumnType::MapTextDouble,
            reason: reason.to_string(),
        };

        let mut chars = raw.chars();
        let body = match (chars.next(), chars.next_back()) {
            (Some(_), Some(_)) => chars.as_str(),
            _ => return Err(malformed("expected enclosing brackets")),
        };

        let mut map = BTreeMap::new();
        if body.trim().is_empty() {
            return Ok(map);
        }

        for pair in body.split(self.list_delimiter) {
            let (key, value) = pair
                .rsplit_once(':')
                .ok_or_else(|| malformed(&format!("entry '{pair}' has no ':'")))?;

            let key = key.trim().trim_matches(MAP_KEY_QUOTES);
            let value = value
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed(&format!("entry '{pair}' has a non-numeric value")))?;

            map.insert(key.to_string(), value);
        }

        Ok(map)
    }
}

fn not_numeric(raw: &str, expected: ColumnType) -> CoercionError {
    CoercionError::NotNumeric {
        raw: raw.to_string(),
        expected,
    }
}

fn parse_integer<T>(raw: &str, expected: ColumnType) -> Result<T, CoercionError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    raw.parse::<T>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => CoercionError::IntegerOverflow {
            raw: raw.to_string(),
            expected,
        },
        _ => not_numeric(raw, expected),
    })
}

/// Decimal digits with an optional sign; digit separators are not accepted
fn parse_varint(raw: &str, expected: ColumnType) -> Result<BigInt, CoercionError> {
    if raw.contains('_') {
        return Err(not_numeric(raw, expected));
    }
    raw.parse::<BigInt>().map_err(|_| not_numeric(raw, expected))
}

fn parse_float<T>(raw: &str, expected: ColumnType) -> Result<T, CoercionError>
where
    T: std::str::FromStr<Err = std::num::ParseFloatError>,
{
    raw.trim().parse::<T>().map_err(|_| not_numeric(raw, expected))
}

/// Parse a timestamp starting with `yyyy-MM-dd HH:mm:ss`; `None` when the
/// prefix does not match.
///
/// Anything after the seconds is ignored, so `2020-01-02 03:04:05.0` keeps
/// its whole-second value.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_and_remainder(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|(ts, _)| ts)
}
