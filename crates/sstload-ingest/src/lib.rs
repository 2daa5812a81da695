//! sstload ingest library
//!
//! Converts delimited text into typed rows for a columnar table store.
//!
//! # Pipeline
//!
//! - [`schema`]: column types from a CQL `CREATE TABLE` statement
//! - [`mapping`]: which field of a line feeds which column
//! - [`splitter`]: one line into raw fields
//! - [`coerce`]: one raw field into a typed [`types::Value`]
//! - [`loader`]: drives the above line by line into a [`writer::RowWriter`]
//!
//! # Example
//!
//! ```no_run
//! use sstload_ingest::{IngestConfig, LoadJob};
//!
//! fn main() -> anyhow::Result<()> {
//!     let job = LoadJob {
//!         cql: "CREATE TABLE ks.events (id int PRIMARY KEY, tags list<text>)".into(),
//!         mapping: "id:0,tags:1".into(),
//!         input: "events.csv".into(),
//!         output: "output".into(),
//!     };
//!     let report = job.run(&IngestConfig::default(), None, None)?;
//!     println!("{} rows written", report.rows_written);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod coerce;
pub mod config;
pub mod error;
pub mod job;
pub mod loader;
pub mod mapping;
pub mod schema;
pub mod splitter;
pub mod trace;
pub mod types;
pub mod writer;

pub use cli::Cli;
pub use config::{IngestConfig, RowErrorPolicy};
pub use error::{IngestError, Result, RowError};
pub use job::LoadJob;
pub use loader::{IngestReport, LoadPlan, Loader};
pub use types::{ColumnType, Value};
