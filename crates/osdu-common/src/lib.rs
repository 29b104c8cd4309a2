//! OSDU Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the OSDU ingest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`OsduError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//! - **Types**: object records, categories, schema kinds, and the inventory row shape
//!
//! # Example
//!
//! ```no_run
//! use osdu_common::types::{Category, ObjectRecord};
//!
//! let record = ObjectRecord::new("files/Volve/well_logs/WELL-42.las", "corpus", 1024);
//! assert_eq!(record.extension(), ".las");
//! assert_eq!(Category::WellLogs.as_str(), "Well Logs");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{OsduError, Result};
