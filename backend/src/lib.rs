//! # Stockreport - Inventory dead stock and purchase reports
//!
//! Stockreport reads point-of-sale inventory exports (XLSX workbooks or CSV)
//! and produces dashboard-ready reports: dead stock, unwanted purchases and
//! re-purchases, and dead stock per supplier.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ XLSX / CSV  │────▶│   Parser    │────▶│  Pipeline   │────▶│ ReportResult│
//! │  sources    │     │ (auto-enc)  │     │ (profile)   │     │ JSON / CSV  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stockreport::{run, ReportProfile, RunConfig, SourceSpec};
//!
//! let profile = ReportProfile::builtin("dead-stock").unwrap();
//! let config = RunConfig::new(vec![SourceSpec::new("dead_stock1.xlsx")], profile);
//! let report = run(&config)?;
//! println!("{} dead items", report.metrics.item_count);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Rows, row sets, selections and tables
//! - [`parser`] - CSV and workbook reading with auto-detection
//! - [`transform`] - Predicates, pipeline stages and the report run
//! - [`profiles`] - Built-in and custom report profiles
//! - [`report`] - Report assembly, terminal rendering and CSV export
//! - [`cache`] - Prepared row set cache
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Pipeline
pub mod transform;

// Report definitions and output
pub mod profiles;
pub mod report;

// Caching
pub mod cache;

// Ambient
pub mod config;
pub mod logging;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    PipelineResult, PredicateError, RegistryError, ReportError, ServerError, SourceError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{columns, GroupTotal, Record, RowSet, Selection, Table};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_str,
    read_source, SourceFormat, SourceInfo, SourceSpec,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{prepare, run, run_prepared, PreparedRows, RunConfig, Selections};
pub use transform::predicate::Predicate;

// =============================================================================
// Re-exports - Profiles and reports
// =============================================================================

pub use profiles::{builtin_profiles, example_profile, ProfileRegistry, ReportProfile, SelectMode};
pub use report::{ChartBar, ReportResult, SummaryMetrics};

// =============================================================================
// Re-exports - Cache and config
// =============================================================================

pub use cache::RowSetCache;
pub use config::AppConfig;

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
