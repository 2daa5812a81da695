//! Command-line interface for `csv2sstable`

use crate::config::{parse_delimiter, ConfigError, IngestConfig, RowErrorPolicy};
use crate::job::LoadJob;
use clap::Parser;
use std::path::PathBuf;

/// Exit code when the load completed but some lines could not be converted
pub const EXIT_ROWS_FAILED: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "csv2sstable")]
#[command(author, version, about = "Convert delimited text into table rows for bulk loading")]
#[command(long_about = "Reads a delimited text file line by line, coerces the mapped fields to \
the column types of a CQL CREATE TABLE statement and writes the rows to \
<output>/<keyspace>/<table>.")]
pub struct Cli {
    /// CQL CREATE TABLE statement describing the target table
    #[arg(long)]
    pub cql: String,

    /// Column to field mapping, e.g. "id:0,tags:1,seen:2"
    #[arg(long)]
    pub mapping: String,

    /// Delimited input file
    #[arg(long)]
    pub csv: PathBuf,

    /// Output root directory
    #[arg(long)]
    pub output: PathBuf,

    /// Print every row's fields, types and coerced values to stdout
    #[arg(long)]
    pub debug: bool,

    /// Field delimiter: a character, \t, \xNN or \uNNNN [default: \x01]
    #[arg(long, value_parser = parse_char_arg)]
    pub delimiter: Option<char>,

    /// Collection member delimiter [default: \x02]
    #[arg(long, value_parser = parse_char_arg)]
    pub list_delimiter: Option<char>,

    /// Quote character; enables quote-aware splitting
    #[arg(long, value_parser = parse_char_arg)]
    pub quote: Option<char>,

    /// Parse buffer capacity in bytes; longer fields fail their line
    #[arg(long)]
    pub buffer_capacity: Option<usize>,

    /// Stop at the first line that cannot be converted
    #[arg(long)]
    pub fail_fast: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_char_arg(s: &str) -> Result<char, String> {
    parse_delimiter(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Environment settings overridden by explicit flags
    pub fn ingest_config(&self) -> Result<IngestConfig, ConfigError> {
        let mut config = IngestConfig::from_env()?;

        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(list_delimiter) = self.list_delimiter {
            config.list_delimiter = list_delimiter;
        }
        if self.quote.is_some() {
            config.quote = self.quote;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if self.fail_fast {
            config.row_error_policy = RowErrorPolicy::AbortRun;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn job(&self) -> LoadJob {
        LoadJob {
            cql: self.cql.clone(),
            mapping: self.mapping.clone(),
            input: self.csv.clone(),
            output: self.output.clone(),
        }
    }
}
