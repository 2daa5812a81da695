//! Per-row diagnostic trace
//!
//! When enabled, every line that splits cleanly announces itself, then each
//! mapped field reports its column, declared type and coerced value.

use crate::types::{ColumnType, Value};
use std::io::Write;
use tracing::warn;

/// Receives trace events from the loader
pub trait TraceSink {
    fn row_start(&mut self, line: u64);

    fn field(&mut self, line: u64, column: &str, column_type: ColumnType, value: &Value);
}

impl<T: TraceSink + ?Sized> TraceSink for Box<T> {
    fn row_start(&mut self, line: u64) {
        (**self).row_start(line);
    }

    fn field(&mut self, line: u64, column: &str, column_type: ColumnType, value: &Value) {
        (**self).field(line, column, column_type, value);
    }
}

/// Writes the human-readable trace to any [`Write`]
///
/// ```text
/// ----------------- ROW 1 -----------------
/// Field: id, Type: int, Value: 7
/// ```
///
/// The first write error disables the trace; the load itself is unaffected.
#[derive(Debug)]
pub struct WriteTrace<W: Write> {
    out: Option<W>,
}

impl<W: Write> WriteTrace<W> {
    pub fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    pub fn into_inner(self) -> Option<W> {
        self.out
    }

    fn emit(&mut self, args: std::fmt::Arguments<'_>) {
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = out.write_fmt(args).and_then(|_| out.write_all(b"\n")) {
                warn!(error = %e, "Disabling row trace after write failure");
                self.out = None;
            }
        }
    }
}

impl<W: Write> TraceSink for WriteTrace<W> {
    fn row_start(&mut self, line: u64) {
        self.emit(format_args!("----------------- ROW {line} -----------------"));
    }

    fn field(&mut self, _line: u64, column: &str, column_type: ColumnType, value: &Value) {
        self.emit(format_args!("Field: {column}, Type: {column_type}, Value: {value}"));
    }
}

/// One recorded trace event
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    RowStart(u64),
    Field {
        line: u64,
        column: String,
        column_type: ColumnType,
        value: Value,
    },
}

impl TraceSink for Vec<TraceEvent> {
    fn row_start(&mut self, line: u64) {
        self.push(TraceEvent::RowStart(line));
    }

    fn field(&mut self, line: u64, column: &str, column_type: ColumnType, value: &Value) {
        self.push(TraceEvent::Field {
            line,
            column: column.to_string(),
            column_type,
            value: value.clone(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_write_trace_format() {
        let mut trace = WriteTrace::new(Vec::new());
        trace.row_start(3);
        trace.field(3, "id", ColumnType::Int32, &Value::Int32(7));
        trace.field(3, "tags", ColumnType::ListText, &Value::List(vec!["a".into(), "b".into()]));
        trace.field(3, "seen", ColumnType::Timestamp, &Value::Null);

        let text = String::from_utf8(trace.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "----------------- ROW 3 -----------------\n\
             Field: id, Type: int, Value: 7\n\
             Field: tags, Type: list<text>, Value: [a, b]\n\
             Field: seen, Type: timestamp, Value: null\n"
        );
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_disables_trace() {
        let mut trace = WriteTrace::new(Broken);
        trace.row_start(1);
        trace.field(1, "id", ColumnType::Int32, &Value::Int32(1));
        assert!(trace.into_inner().is_none());
    }
}
