//! Delimited line splitter
//!
//! Splits one input line into raw field strings. Two modes:
//!
//! - [`SplitMode::Bytes`]: every occurrence of the delimiter byte ends a
//!   field. There is no quoting.
//! - [`SplitMode::Quoted`]: the quote character toggles an in-quotes flag and
//!   is dropped from the output; delimiters inside quotes are kept as data.
//!   Doubled quotes are not an escape, and an unmatched quote swallows the
//!   rest of the line.
//!
//! Field bytes accumulate in a scratch buffer allocated once per splitter.
//! The buffer never grows: a field longer than its capacity fails the line.

use thiserror::Error;
use tracing::debug;

/// Default scratch buffer capacity (100 MiB), large enough for flattened
/// collection columns.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("field exceeds parse buffer capacity of {capacity} bytes")]
    BufferCapacityExceeded { capacity: usize },
}

/// How a line is tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Split on a single byte, no quote awareness
    Bytes { delimiter: u8 },
    /// Split on a character, ignoring delimiters between quote characters
    Quoted { delimiter: char, quote: char },
}

impl SplitMode {
    /// Build a mode from a delimiter and an optional quote character
    ///
    /// Without a quote the delimiter must be ASCII so it can be matched
    /// bytewise without cutting a multi-byte character.
    pub fn new(delimiter: char, quote: Option<char>) -> Option<Self> {
        match quote {
            Some(quote) => Some(SplitMode::Quoted { delimiter, quote }),
            None if delimiter.is_ascii() => Some(SplitMode::Bytes {
                delimiter: delimiter as u8,
            }),
            None => None,
        }
    }
}

/// Splits lines into fields, reusing one scratch buffer and one output
/// vector across calls.
#[derive(Debug)]
pub struct FieldSplitter {
    mode: SplitMode,
    buffer: Vec<u8>,
    capacity: usize,
    fields: Vec<String>,
    unbalanced: bool,
}

impl FieldSplitter {
    pub fn new(mode: SplitMode, capacity: usize) -> Self {
        Self {
            mode,
            buffer: Vec::with_capacity(capacity),
            capacity,
            fields: Vec::new(),
            unbalanced: false,
        }
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Capacity of the scratch buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes actually reserved by the scratch buffer.
    pub fn reserved(&self) -> usize {
        self.buffer.capacity()
    }

    /// Whether the last split line ended inside an open quote.
    pub fn last_line_unbalanced(&self) -> bool {
        self.unbalanced
    }

    /// Split `line` into fields.
    ///
    /// The returned slice borrows the splitter and is overwritten by the next
    /// call. An empty line yields a single empty field.
    pub fn split(&mut self, line: &str) -> Result<&[String], SplitError> {
        self.fields.clear();
        self.buffer.clear();
        self.unbalanced = false;

        let result = match self.mode {
            SplitMode::Bytes { delimiter } => self.split_bytes(line, delimiter),
            SplitMode::Quoted { delimiter, quote } => self.split_quoted(line, delimiter, quote),
        };

        if let Err(err) = result {
            self.buffer.clear();
            self.fields.clear();
            return Err(err);
        }

        self.emit();
        Ok(&self.fields)
    }

    fn split_bytes(&mut self, line: &str, delimiter: u8) -> Result<(), SplitError> {
        for &byte in line.as_bytes() {
            if byte == delimiter {
                self.emit();
            } else {
                self.push(&[byte])?;
            }
        }
        Ok(())
    }

    fn split_quoted(&mut self, line: &str, delimiter: char, quote: char) -> Result<(), SplitError> {
        let mut in_quotes = false;
        let mut utf8 = [0u8; 4];

        for ch in line.chars() {
            if ch == quote {
                in_quotes = !in_quotes;
            } else if ch == delimiter && !in_quotes {
                self.emit();
            } else {
                self.push(ch.encode_utf8(&mut utf8).as_bytes())?;
            }
        }

        if in_quotes {
            debug!("Line ends inside an open quote");
            self.unbalanced = true;
        }
        Ok(())
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), SplitError> {
        if self.buffer.len() + bytes.len() > self.capacity {
            return Err(SplitError::BufferCapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn emit(&mut self) {
        // Fields are cut at ASCII delimiters or char boundaries, so the
        // buffer always holds whole UTF-8 sequences.
        let field = String::from_utf8_lossy(&self.buffer).into_owned();
        self.fields.push(field);
        self.buffer.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bytes(delimiter: u8) -> FieldSplitter {
        FieldSplitter::new(SplitMode::Bytes { delimiter }, 1024)
    }

    fn quoted() -> FieldSplitter {
        FieldSplitter::new(
            SplitMode::Quoted {
                delimiter: ',',
                quote: '"',
            },
            1024,
        )
    }

    #[test]
    fn test_byte_split() {
        let mut splitter = bytes(b',');
        assert_eq!(splitter.split("a,b,c").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_byte_split_has_no_quotes() {
        let mut splitter = bytes(b',');
        assert_eq!(splitter.split("a,\"b,c\"").unwrap(), ["a", "\"b", "c\""]);
    }

    #[test]
    fn test_empty_line_yields_one_empty_field() {
        assert_eq!(bytes(b',').split("").unwrap(), [""]);
        assert_eq!(quoted().split("").unwrap(), [""]);
    }

    #[test]
    fn test_trailing_delimiter_yields_empty_field() {
        assert_eq!(bytes(b',').split("a,").unwrap(), ["a", ""]);
        assert_eq!(quoted().split("a,,").unwrap(), ["a", "", ""]);
    }

    #[test]
    fn test_control_char_delimiter() {
        let mut splitter = bytes(0x01);
        assert_eq!(splitter.split("7\u{1}x\u{2}y\u{1}").unwrap(), ["7", "x\u{2}y", ""]);
    }

    #[test]
    fn test_quoted_split_protects_delimiter() {
        let mut splitter = quoted();
        assert_eq!(splitter.split("a,\"b,c\",d").unwrap(), ["a", "b,c", "d"]);
    }

    #[test]
    fn test_quotes_are_stripped_everywhere() {
        let mut splitter = quoted();
        assert_eq!(splitter.split("\"\",x\"y\"z,\"\"\"\"").unwrap(), ["", "xyz", ""]);
        assert!(!splitter.last_line_unbalanced());
    }

    #[test]
    fn test_unmatched_quote_swallows_rest_of_line() {
        let mut splitter = quoted();
        assert_eq!(splitter.split("a,\"b,c,d").unwrap(), ["a", "b,c,d"]);
        assert!(splitter.last_line_unbalanced());

        splitter.split("a,b").unwrap();
        assert!(!splitter.last_line_unbalanced());
    }

    #[test]
    fn test_quoted_multibyte_characters() {
        let mut splitter = FieldSplitter::new(
            SplitMode::Quoted {
                delimiter: '¦',
                quote: '«',
            },
            64,
        );
        assert_eq!(splitter.split("zoë¦«a¦b«¦ж").unwrap(), ["zoë", "a¦b", "ж"]);
    }

    #[test]
    fn test_buffer_capacity_exceeded() {
        let mut splitter = FieldSplitter::new(SplitMode::Bytes { delimiter: b',' }, 4);
        assert_eq!(splitter.split("abcd,efgh").unwrap(), ["abcd", "efgh"]);
        assert_eq!(
            splitter.split("abcde,f").unwrap_err(),
            SplitError::BufferCapacityExceeded { capacity: 4 }
        );
        // The splitter stays usable after a failed line.
        assert_eq!(splitter.split("ab,c").unwrap(), ["ab", "c"]);
    }

    #[test]
    fn test_multibyte_char_counts_all_bytes() {
        let mut splitter = FieldSplitter::new(
            SplitMode::Quoted {
                delimiter: ',',
                quote: '"',
            },
            3,
        );
        assert!(splitter.split("aé").is_ok());
        assert!(splitter.split("aaé").is_err());
    }

    #[test]
    fn test_buffer_is_allocated_once() {
        let mut splitter = FieldSplitter::new(SplitMode::Bytes { delimiter: b'|' }, 256);
        let reserved = splitter.reserved();
        assert!(reserved >= 256);

        for i in 0..10_000 {
            let line = format!("{i}|row-{i}|{}", "x".repeat(i % 200));
            splitter.split(&line).unwrap();
        }

        assert_eq!(splitter.reserved(), reserved);
    }

    #[test]
    fn test_split_mode_requires_ascii_byte_delimiter() {
        assert_eq!(
            SplitMode::new(',', None),
            Some(SplitMode::Bytes { delimiter: b',' })
        );
        assert_eq!(SplitMode::new('¦', None), None);
        assert_eq!(
            SplitMode::new('¦', Some('"')),
            Some(SplitMode::Quoted {
                delimiter: '¦',
                quote: '"'
            })
        );
    }

    proptest! {
        #[test]
        fn prop_byte_split_rejoins(fields in proptest::collection::vec("[a-z0-9 :\\-]{0,12}", 1..12)) {
            let line = fields.join("\u{1}");
            let mut splitter = bytes(0x01);
            let split = splitter.split(&line).unwrap();
            prop_assert_eq!(split.len(), fields.len());
            prop_assert_eq!(split.join("\u{1}"), line);
        }
    }
}
