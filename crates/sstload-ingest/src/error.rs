//! Error types for ingestion
//!
//! [`RowError`] covers one bad line and never ends a load by itself.
//! [`IngestError`] is everything that does.

use crate::coerce::CoercionError;
use crate::config::ConfigError;
use crate::mapping::MappingError;
use crate::schema::SchemaError;
use crate::splitter::SplitError;
use crate::writer::WriterError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single line could not become a row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("column '{column}' maps to field {index}, but the line has {available} fields")]
    FieldIndexOutOfRange {
        column: String,
        index: usize,
        available: usize,
    },

    #[error("column '{column}': {source}")]
    Coercion {
        column: String,
        #[source]
        source: CoercionError,
    },
}

/// Failures that stop a load
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed mapping: {0}")]
    Mapping(#[from] MappingError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mapping does not match the insert statement: {0}")]
    PlanMismatch(String),

    #[error("cannot create output directory '{path}': {source}")]
    OutputDirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open input '{path}': {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: RowError,
    },

    #[error("cannot open row writer: {0}")]
    WriterOpen(#[source] WriterError),

    #[error("row writer failed at line {line}: {source}")]
    Write {
        line: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to close row writer: {0}")]
    WriterCloseFailed(#[source] WriterError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
