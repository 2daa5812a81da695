//! Bulk row writers
//!
//! A [`RowWriter`] accepts one fully typed row at a time, in insert-statement
//! column order, and is closed exactly once when the load ends. Validation
//! failures are reported as [`SubmitError::Rejected`], which the loader
//! counts and skips; I/O failures end the run.

use crate::schema::{InsertStatement, TableSchema};
use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sstload_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
use sstload_common::CommonError;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Highest generation number tried before giving up on a directory
const MAX_GENERATION: u32 = 100_000;

#[derive(Error, Debug)]
pub enum SubmitError {
    /// The row failed storage validation; the load continues
    #[error("row rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("insert statement is missing primary key column '{0}'")]
    MissingKeyColumn(String),

    #[error("no free generation number in '{0}'")]
    GenerationsExhausted(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("checksum error: {0}")]
    Checksum(#[from] CommonError),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// What a closed writer produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub rows: u64,
    pub files: Vec<PathBuf>,
}

/// Sink for typed rows
pub trait RowWriter {
    /// Submit one row; values follow the insert statement's column order.
    fn add_row(&mut self, row: &[Value]) -> Result<(), SubmitError>;

    /// Flush and release the writer.
    fn close(self) -> Result<WriterSummary, WriterError>
    where
        Self: Sized;
}

/// Create `<root>/<keyspace>/<table>` if needed
pub fn prepare_output_dir(root: &Path, schema: &TableSchema) -> io::Result<PathBuf> {
    let dir = root.join(&schema.keyspace).join(&schema.table);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRole {
    Partition,
    Clustering,
    Regular,
}

/// Writes rows as JSON lines into `<keyspace>-<table>-<generation>-Data.jsonl`
/// and a manifest with the row count and data checksum on close.
#[derive(Debug)]
pub struct DataFileWriter {
    insert: InsertStatement,
    roles: Vec<KeyRole>,
    data_path: PathBuf,
    manifest_path: PathBuf,
    out: BufWriter<File>,
    line: Vec<u8>,
    rows: u64,
}

impl DataFileWriter {
    /// Open a new generation in `dir`.
    ///
    /// Every primary key column must be bound by `insert`.
    pub fn open(
        dir: &Path,
        schema: &TableSchema,
        insert: &InsertStatement,
    ) -> Result<Self, WriterError> {
        for key in schema.partition_key.iter().chain(&schema.clustering_key) {
            if !insert.columns.contains(key) {
                return Err(WriterError::MissingKeyColumn(key.clone()));
            }
        }

        let roles = insert
            .columns
            .iter()
            .map(|column| {
                if schema.is_partition_key(column) {
                    KeyRole::Partition
                } else if schema.is_primary_key(column) {
                    KeyRole::Clustering
                } else {
                    KeyRole::Regular
                }
            })
            .collect();

        let prefix = format!("{}-{}", schema.keyspace, schema.table);
        let (generation, data_path, file) = create_next_generation(dir, &prefix)?;
        let manifest_path = dir.join(format!("{prefix}-{generation}-Manifest.json"));

        info!(
            path = %data_path.display(),
            statement = %insert,
            "Opened data file"
        );

        Ok(Self {
            insert: insert.clone(),
            roles,
            data_path,
            manifest_path,
            out: BufWriter::new(file),
            line: Vec::with_capacity(4096),
            rows: 0,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn validate(&self, row: &[Value]) -> Result<(), SubmitError> {
        if row.len() != self.roles.len() {
            return Err(SubmitError::Rejected(format!(
                "expected {} values, got {}",
                self.roles.len(),
                row.len()
            )));
        }

        for ((column, role), value) in self.insert.columns.iter().zip(&self.roles).zip(row) {
            // JSON has no NaN or infinity
            if !is_finite(value) {
                return Err(SubmitError::Rejected(format!(
                    "non-finite value for column '{column}'"
                )));
            }
            match (role, value) {
                (KeyRole::Regular, _) => {},
                (_, Value::Null) => {
                    return Err(SubmitError::Rejected(format!(
                        "invalid null value for primary key column '{column}'"
                    )));
                },
                (KeyRole::Partition, Value::Text(s)) if s.is_empty() => {
                    return Err(SubmitError::Rejected(format!(
                        "partition key column '{column}' may not be empty"
                    )));
                },
                _ => {},
            }
        }

        Ok(())
    }
}

fn is_finite(value: &Value) -> bool {
    match value {
        Value::Float64(v) => v.is_finite(),
        Value::Float32(v) => v.is_finite(),
        Value::Map(entries) => entries.values().all(|v| v.is_finite()),
        _ => true,
    }
}

fn create_next_generation(dir: &Path, prefix: &str) -> Result<(u32, PathBuf, File), WriterError> {
    for generation in 1..=MAX_GENERATION {
        let path = dir.join(format!("{prefix}-{generation}-Data.jsonl"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((generation, path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(WriterError::GenerationsExhausted(dir.to_path_buf()))
}

/// One row as a JSON object keyed by column name
struct RowRecord<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    keyspace: &'a str,
    table: &'a str,
    statement: String,
    columns: &'a [String],
    rows: u64,
    data_file: String,
    checksum_algorithm: ChecksumAlgorithm,
    checksum: String,
    created_at: DateTime<Utc>,
}

impl RowWriter for DataFileWriter {
    fn add_row(&mut self, row: &[Value]) -> Result<(), SubmitError> {
        self.validate(row)?;

        self.line.clear();
        let record = RowRecord {
            columns: &self.insert.columns,
            values: row,
        };
        serde_json::to_writer(&mut self.line, &record)
            .map_err(|e| SubmitError::Rejected(format!("cannot encode row: {e}")))?;
        self.line.push(b'\n');

        self.out.write_all(&self.line)?;
        self.rows += 1;
        Ok(())
    }

    fn close(self) -> Result<WriterSummary, WriterError> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let checksum = compute_file_checksum(&self.data_path, ChecksumAlgorithm::Sha256)?;
        let data_file = self
            .data_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let manifest = Manifest {
            keyspace: &self.insert.keyspace,
            table: &self.insert.table,
            statement: self.insert.to_string(),
            columns: &self.insert.columns,
            rows: self.rows,
            data_file,
            checksum_algorithm: ChecksumAlgorithm::Sha256,
            checksum,
            created_at: Utc::now(),
        };
        std::fs::write(&self.manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

        debug!(
            rows = self.rows,
            manifest = %self.manifest_path.display(),
            "Closed data file"
        );

        Ok(WriterSummary {
            rows: self.rows,
            files: vec![self.data_path, self.manifest_path],
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sstload_common::checksum::verify_file_checksum;
    use std::collections::BTreeMap;

    fn schema() -> TableSchema {
        TableSchema::parse(
            "CREATE TABLE shop.orders (id text, day int, note text, tags list<text>, PRIMARY KEY ((id), day))",
        )
        .unwrap()
    }

    fn insert(schema: &TableSchema) -> InsertStatement {
        let columns: Vec<String> = ["day", "id", "note", "tags"].map(String::from).to_vec();
        schema.insert_statement(&columns).unwrap()
    }

    fn open(dir: &Path) -> DataFileWriter {
        let schema = schema();
        DataFileWriter::open(dir, &schema, &insert(&schema)).unwrap()
    }

    #[test]
    fn test_prepare_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = prepare_output_dir(root.path(), &schema()).unwrap();
        assert_eq!(dir, root.path().join("shop").join("orders"));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_write_rows_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(dir.path());

        writer
            .add_row(&[
                Value::Int32(3),
                Value::Text("a-1".into()),
                Value::Null,
                Value::List(vec!["x".into(), "y".into()]),
            ])
            .unwrap();

        let summary = writer.close().unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.files.len(), 2);

        let data = std::fs::read_to_string(&summary.files[0]).unwrap();
        let row: serde_json::Value = serde_json::from_str(data.trim_end()).unwrap();
        assert_eq!(
            row,
            serde_json::json!({"day": 3, "id": "a-1", "note": null, "tags": ["x", "y"]})
        );

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&summary.files[1]).unwrap()).unwrap();
        assert_eq!(manifest["rows"], 1);
        assert_eq!(manifest["keyspace"], "shop");
        assert_eq!(manifest["data_file"], "shop-orders-1-Data.jsonl");
        verify_file_checksum(
            &summary.files[0],
            manifest["checksum"].as_str().unwrap(),
            ChecksumAlgorithm::Sha256,
        )
        .unwrap();
    }

    #[test]
    fn test_rejects_null_and_empty_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = open(dir.path());

        let null_clustering = [Value::Null, Value::Text("a".into()), Value::Null, Value::Null];
        assert!(matches!(writer.add_row(&null_clustering), Err(SubmitError::Rejected(_))));

        let empty_partition = [Value::Int32(1), Value::Text(String::new()), Value::Null, Value::Null];
        assert!(matches!(writer.add_row(&empty_partition), Err(SubmitError::Rejected(_))));

        let short = [Value::Int32(1)];
        assert!(matches!(writer.add_row(&short), Err(SubmitError::Rejected(_))));

        assert_eq!(writer.close().unwrap().rows, 0);
    }

    #[test]
    fn test_rejects_non_finite_floats() {
        let dir = tempfile::tempdir().unwrap();
        let schema = TableSchema::parse(
            "CREATE TABLE shop.prices (id text PRIMARY KEY, price double, weight float, rates map<text, double>)",
        )
        .unwrap();
        let columns: Vec<String> = ["id", "price", "weight", "rates"].map(String::from).to_vec();
        let insert = schema.insert_statement(&columns).unwrap();
        let mut writer = DataFileWriter::open(dir.path(), &schema, &insert).unwrap();

        let row = |price: f64, weight: f32, rate: f64| {
            [
                Value::Text("p".into()),
                Value::Float64(price),
                Value::Float32(weight),
                Value::Map(BTreeMap::from([("eur".to_string(), rate)])),
            ]
        };

        for bad in [
            row(f64::NAN, 1.0, 1.0),
            row(1.0, f32::INFINITY, 1.0),
            row(1.0, 1.0, f64::NEG_INFINITY),
        ] {
            assert!(matches!(writer.add_row(&bad), Err(SubmitError::Rejected(_))));
        }
        writer.add_row(&row(2.5, 0.5, 1.25)).unwrap();

        let summary = writer.close().unwrap();
        assert_eq!(summary.rows, 1);
        let data = std::fs::read_to_string(&summary.files[0]).unwrap();
        let written: serde_json::Value = serde_json::from_str(data.trim_end()).unwrap();
        assert_eq!(written["price"], 2.5);
        assert_eq!(written["rates"]["eur"], 1.25);
    }

    #[test]
    fn test_generations_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = open(dir.path());
        let second = open(dir.path());

        assert!(first.data_path().ends_with("shop-orders-1-Data.jsonl"));
        assert!(second.data_path().ends_with("shop-orders-2-Data.jsonl"));

        first.close().unwrap();
        second.close().unwrap();
    }

    #[test]
    fn test_insert_must_bind_primary_key() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let insert = schema.insert_statement(&["id".to_string(), "note".to_string()]).unwrap();

        let err = DataFileWriter::open(dir.path(), &schema, &insert).unwrap_err();
        assert!(matches!(err, WriterError::MissingKeyColumn(column) if column == "day"));
    }
}
