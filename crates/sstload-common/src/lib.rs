//! sstload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the sstload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Error and result types for the shared utilities
//! - **Checksums**: Integrity digests for written data files
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use sstload_common::checksum::compute_file_checksum;
//! use sstload_common::{ChecksumAlgorithm, Result};
//!
//! fn digest(path: &str) -> Result<String> {
//!     compute_file_checksum(path, ChecksumAlgorithm::Sha256)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use checksum::ChecksumAlgorithm;
pub use error::{CommonError, Result};
