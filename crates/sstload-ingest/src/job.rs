//! One file-to-table load
//!
//! Resolves the schema and mapping, prepares `<output>/<keyspace>/<table>`,
//! opens the input and a [`DataFileWriter`], then hands off to the
//! [`Loader`]. Everything that can fail before the first row is checked
//! before any output file is created.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::loader::{IngestReport, LoadPlan, Loader};
use crate::mapping::FieldMapping;
use crate::schema::{InsertStatement, TableSchema};
use crate::trace::TraceSink;
use crate::writer::{prepare_output_dir, DataFileWriter};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::info;

/// Inputs of a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// `CREATE TABLE` statement
    pub cql: String,
    /// `name:index,...`
    pub mapping: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Resolved schema, mapping and insert statement
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub schema: TableSchema,
    pub mapping: FieldMapping,
    pub insert: InsertStatement,
    pub plan: LoadPlan,
}

impl LoadJob {
    /// Resolve everything that does not touch the filesystem
    pub fn prepare(&self) -> Result<PreparedJob> {
        let schema = TableSchema::parse(&self.cql)?;
        let mapping = FieldMapping::parse(&self.mapping)?;
        let insert = schema.insert_statement(&mapping.columns())?;
        let plan = LoadPlan::new(&mapping, &schema, &insert)?;

        info!(
            table = %schema.qualified_name(),
            columns = mapping.len(),
            statement = %insert,
            "Resolved load plan"
        );

        Ok(PreparedJob {
            schema,
            mapping,
            insert,
            plan,
        })
    }

    /// Run the load to completion
    pub fn run(
        &self,
        config: &IngestConfig,
        trace: Option<Box<dyn TraceSink>>,
        progress: Option<ProgressBar>,
    ) -> Result<IngestReport> {
        let prepared = self.prepare()?;
        let mut loader = Loader::new(prepared.plan.clone(), config)?;
        if let Some(trace) = trace {
            loader = loader.with_trace(trace);
        }
        if let Some(progress) = progress {
            loader = loader.with_progress(progress);
        }

        let dir = prepare_output_dir(&self.output, &prepared.schema).map_err(|source| {
            IngestError::OutputDirectoryUnavailable {
                path: self.output.join(&prepared.schema.keyspace).join(&prepared.schema.table),
                source,
            }
        })?;

        let input = File::open(&self.input).map_err(|source| IngestError::InputUnavailable {
            path: self.input.clone(),
            source,
        })?;

        let writer = DataFileWriter::open(&dir, &prepared.schema, &prepared.insert)
            .map_err(IngestError::WriterOpen)?;

        info!(input = %self.input.display(), output = %dir.display(), "Loading");
        loader.run(LossyLines::new(BufReader::new(input)), writer)
    }
}

/// Lines of a reader with `\n` or `\r\n` removed; invalid UTF-8 is replaced
/// rather than failing the whole load.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            },
            Err(e) => Some(Err(e)),
        }
    }
}
