//! Row loader
//!
//! Drives one load: every input line is split, its mapped fields are coerced
//! to their column types, and the row is submitted to a [`RowWriter`] in
//! insert-statement order. Lines are handled strictly in input order and a
//! bad line never prevents later lines from being attempted under
//! [`RowErrorPolicy::SkipLine`]. The writer is closed exactly once, whether
//! the load finishes or fails.

use crate::coerce::Coercer;
use crate::config::{IngestConfig, RowErrorPolicy};
use crate::error::{IngestError, Result, RowError};
use crate::mapping::FieldMapping;
use crate::schema::{InsertStatement, SchemaError, TableSchema};
use crate::splitter::{FieldSplitter, SplitMode};
use crate::trace::TraceSink;
use crate::types::{ColumnType, Value};
use crate::writer::{RowWriter, SubmitError, WriterSummary};
use indicatif::ProgressBar;
use std::io;
use tracing::{debug, error, info, warn};

/// Row failures kept in the report; later ones are only counted
pub const MAX_RECORDED_FAILURES: usize = 100;

/// Progress is refreshed every this many lines
const PROGRESS_INTERVAL: u64 = 10_000;

/// One column of the load plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub name: String,
    pub field_index: usize,
    pub column_type: ColumnType,
}

/// Columns to fill, in insert-statement order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    columns: Vec<PlannedColumn>,
}

impl LoadPlan {
    /// Reconcile the mapping with the insert statement.
    ///
    /// Both must name the same columns; the plan follows the insert order.
    pub fn new(
        mapping: &FieldMapping,
        schema: &TableSchema,
        insert: &InsertStatement,
    ) -> Result<Self> {
        if mapping.len() != insert.columns.len() {
            return Err(IngestError::PlanMismatch(format!(
                "mapping has {} columns, insert statement binds {}",
                mapping.len(),
                insert.columns.len()
            )));
        }

        let columns = insert
            .columns
            .iter()
            .map(|name| -> Result<PlannedColumn> {
                let field_index = mapping.get(name).ok_or_else(|| {
                    IngestError::PlanMismatch(format!("column '{name}' has no field mapping"))
                })?;
                let column_type =
                    schema
                        .column_type(name)
                        .ok_or_else(|| SchemaError::UnknownColumn {
                            column: name.clone(),
                            table: schema.qualified_name(),
                        })?;

                Ok(PlannedColumn {
                    name: name.clone(),
                    field_index,
                    column_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[PlannedColumn] {
        &self.columns
    }
}

/// A line that did not become a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub line: u64,
    pub error: RowError,
}

/// Outcome of a completed load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub lines_read: u64,
    pub rows_written: u64,
    /// Rows the writer refused
    pub rows_rejected: u64,
    /// Lines that failed splitting or coercion
    pub rows_failed: u64,
    /// First [`MAX_RECORDED_FAILURES`] failures
    pub failures: Vec<RowFailure>,
    pub writer: WriterSummary,
}

impl IngestReport {
    /// Every line was converted; writer rejections do not count against it
    pub fn is_clean(&self) -> bool {
        self.rows_failed == 0
    }

    fn record_failure(&mut self, line: u64, error: RowError) {
        self.rows_failed += 1;
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(RowFailure { line, error });
        }
    }
}

/// Converts lines into rows and feeds them to a writer
pub struct Loader {
    plan: LoadPlan,
    splitter: FieldSplitter,
    coercer: Coercer,
    policy: RowErrorPolicy,
    row: Vec<Value>,
    trace: Option<Box<dyn TraceSink>>,
    progress: Option<ProgressBar>,
}

impl Loader {
    pub fn new(plan: LoadPlan, config: &IngestConfig) -> Result<Self> {
        let mode: SplitMode = config.split_mode()?;
        let width = plan.columns.len();

        Ok(Self {
            plan,
            splitter: FieldSplitter::new(mode, config.buffer_capacity),
            coercer: Coercer::new(config.list_delimiter),
            policy: config.row_error_policy,
            row: Vec::with_capacity(width),
            trace: None,
            progress: None,
        })
    }

    pub fn with_trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace = Some(Box::new(sink));
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// Load every line, then close `writer`.
    pub fn run<I, W>(&mut self, lines: I, mut writer: W) -> Result<IngestReport>
    where
        I: IntoIterator<Item = io::Result<String>>,
        W: RowWriter,
    {
        let mut report = IngestReport::default();
        let outcome = self.load(lines, &mut writer, &mut report);
        let closed = writer.close();

        if let Some(progress) = self.progress.take() {
            progress.finish_and_clear();
        }

        match (outcome, closed) {
            (Ok(()), Ok(summary)) => {
                report.writer = summary;
                info!(
                    lines = report.lines_read,
                    written = report.rows_written,
                    rejected = report.rows_rejected,
                    failed = report.rows_failed,
                    "Load complete"
                );
                Ok(report)
            },
            (Ok(()), Err(e)) => Err(IngestError::WriterCloseFailed(e)),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(close_error)) => {
                error!(error = %close_error, "Writer also failed to close");
                Err(e)
            },
        }
    }

    fn load<I, W>(&mut self, lines: I, writer: &mut W, report: &mut IngestReport) -> Result<()>
    where
        I: IntoIterator<Item = io::Result<String>>,
        W: RowWriter,
    {
        for line in lines {
            let line_no = report.lines_read + 1;
            let line = line.map_err(|source| IngestError::Read {
                line: line_no,
                source,
            })?;
            report.lines_read = line_no;

            if let Err(err) = self.build_row(&line, line_no) {
                match self.policy {
                    RowErrorPolicy::SkipLine => {
                        warn!(line = line_no, error = %err, "Skipping line");
                        report.record_failure(line_no, err);
                        self.tick(line_no);
                        continue;
                    },
                    RowErrorPolicy::AbortRun => {
                        return Err(IngestError::Row {
                            line: line_no,
                            source: err,
                        });
                    },
                }
            }

            match writer.add_row(&self.row) {
                Ok(()) => report.rows_written += 1,
                Err(SubmitError::Rejected(reason)) => {
                    debug!(line = line_no, %reason, "Writer rejected row");
                    report.rows_rejected += 1;
                },
                Err(SubmitError::Io(source)) => {
                    return Err(IngestError::Write {
                        line: line_no,
                        source,
                    });
                },
            }

            self.tick(line_no);
        }

        Ok(())
    }

    /// Fill `self.row` from one line
    fn build_row(&mut self, line: &str, line_no: u64) -> std::result::Result<(), RowError> {
        self.row.clear();
        let fields = self.splitter.split(line)?;

        if let Some(trace) = self.trace.as_mut() {
            trace.row_start(line_no);
        }

        for column in &self.plan.columns {
            let raw = fields
                .get(column.field_index)
                .ok_or_else(|| RowError::FieldIndexOutOfRange {
                    column: column.name.clone(),
                    index: column.field_index,
                    available: fields.len(),
                })?;

            let value = self
                .coercer
                .coerce(raw, column.column_type)
                .map_err(|source| RowError::Coercion {
                    column: column.name.clone(),
                    source,
                })?;

            if let Some(trace) = self.trace.as_mut() {
                trace.field(line_no, &column.name, column.column_type, &value);
            }
            self.row.push(value);
        }

        Ok(())
    }

    fn tick(&self, line_no: u64) {
        if line_no % PROGRESS_INTERVAL == 0 {
            if let Some(progress) = &self.progress {
                progress.set_position(line_no);
            }
        }
    }
}
