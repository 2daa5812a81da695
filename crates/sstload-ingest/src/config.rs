//! Ingestion settings
//!
//! Defaults match the control-character layout produced by Hive-style
//! exports: fields split on `\x01`, collection members on `\x02`, no quoting.
//! Every setting can be overridden from the environment and then from the
//! command line.

use crate::coerce::DEFAULT_LIST_DELIMITER;
use crate::splitter::{SplitMode, DEFAULT_BUFFER_CAPACITY};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Environment Variables
// ============================================================================

pub const ENV_DELIMITER: &str = "SSTLOAD_DELIMITER";
pub const ENV_LIST_DELIMITER: &str = "SSTLOAD_LIST_DELIMITER";
pub const ENV_QUOTE: &str = "SSTLOAD_QUOTE";
pub const ENV_BUFFER_CAPACITY: &str = "SSTLOAD_BUFFER_CAPACITY";
pub const ENV_FAIL_FAST: &str = "SSTLOAD_FAIL_FAST";

/// Default field delimiter
pub const DEFAULT_DELIMITER: char = '\u{1}';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid delimiter '{0}': expected one character, \\t, \\xNN or \\uNNNN")]
    InvalidDelimiter(String),

    #[error("delimiter {0:?} must be ASCII unless a quote character is set")]
    NonAsciiDelimiter(char),

    #[error("{first} and {second} must differ, both are {value:?}")]
    Conflict {
        first: &'static str,
        second: &'static str,
        value: char,
    },

    #[error("buffer capacity must be greater than zero")]
    ZeroBufferCapacity,

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// What happens to a line that cannot be split or coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowErrorPolicy {
    /// Log the line, count it and continue
    #[default]
    SkipLine,
    /// Stop the load at the first bad line
    AbortRun,
}

impl fmt::Display for RowErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowErrorPolicy::SkipLine => write!(f, "skip"),
            RowErrorPolicy::AbortRun => write!(f, "abort"),
        }
    }
}

impl FromStr for RowErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "skip-line" => Ok(RowErrorPolicy::SkipLine),
            "abort" | "abort-run" | "fail-fast" => Ok(RowErrorPolicy::AbortRun),
            _ => Err(ConfigError::InvalidValue {
                key: "row error policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub delimiter: char,
    /// Enables quote-aware splitting when set
    pub quote: Option<char>,
    pub list_delimiter: char,
    pub buffer_capacity: usize,
    pub row_error_policy: RowErrorPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            quote: None,
            list_delimiter: DEFAULT_LIST_DELIMITER,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            row_error_policy: RowErrorPolicy::SkipLine,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by `SSTLOAD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var(ENV_DELIMITER) {
            self.delimiter = parse_delimiter(&value)?;
        }

        if let Ok(value) = std::env::var(ENV_LIST_DELIMITER) {
            self.list_delimiter = parse_delimiter(&value)?;
        }

        if let Ok(value) = std::env::var(ENV_QUOTE) {
            self.quote = if value.is_empty() {
                None
            } else {
                Some(parse_delimiter(&value)?)
            };
        }

        if let Ok(value) = std::env::var(ENV_BUFFER_CAPACITY) {
            self.buffer_capacity = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_BUFFER_CAPACITY.to_string(),
                value: value.clone(),
            })?;
        }

        if let Ok(value) = std::env::var(ENV_FAIL_FAST) {
            self.row_error_policy = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => RowErrorPolicy::AbortRun,
                "0" | "false" | "no" | "" => RowErrorPolicy::SkipLine,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_FAIL_FAST.to_string(),
                        value,
                    })
                },
            };
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }

        if self.delimiter == self.list_delimiter {
            return Err(ConfigError::Conflict {
                first: "field delimiter",
                second: "list delimiter",
                value: self.delimiter,
            });
        }

        match self.quote {
            Some(quote) if quote == self.delimiter => Err(ConfigError::Conflict {
                first: "field delimiter",
                second: "quote character",
                value: quote,
            }),
            None if !self.delimiter.is_ascii() => Err(ConfigError::NonAsciiDelimiter(self.delimiter)),
            _ => Ok(()),
        }
    }

    /// Splitting mode implied by the delimiter and quote settings
    pub fn split_mode(&self) -> Result<SplitMode, ConfigError> {
        self.validate()?;
        SplitMode::new(self.delimiter, self.quote)
            .ok_or(ConfigError::NonAsciiDelimiter(self.delimiter))
    }
}

/// Parse a delimiter argument
///
/// Accepts a single character or one of the escapes `\t`, `\\`, `\xNN` and
/// `\uNNNN`, so control characters can be passed on a command line.
pub fn parse_delimiter(s: &str) -> Result<char, ConfigError> {
    let invalid = || ConfigError::InvalidDelimiter(s.to_string());

    let mut chars = s.chars();
    let first = chars.next().ok_or_else(invalid)?;
    if chars.as_str().is_empty() {
        return Ok(first);
    }
    if first != '\\' {
        return Err(invalid());
    }

    let escape = chars.next().ok_or_else(invalid)?;
    let rest = chars.as_str();
    match (escape, rest.len()) {
        ('t', 0) => Ok('\t'),
        ('\\', 0) => Ok('\\'),
        ('x', 2) | ('u', 4) => u32::from_str_radix(rest, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
