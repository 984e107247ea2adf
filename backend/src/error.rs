//! Error types for the stock report pipeline.
//!
//! - [`SourceError`] - Reading a spreadsheet or CSV export
//! - [`PredicateError`] - Parsing a row filter expression
//! - [`RegistryError`] - Custom profile storage
//! - [`ReportError`] - Top-level pipeline errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading one source file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to open or read a workbook.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Requested sheet does not exist.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    Parse(String),

    /// Empty file.
    #[error("Source is empty")]
    Empty,

    /// Unknown file extension.
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),
}

// =============================================================================
// Predicate Errors
// =============================================================================

/// Errors while parsing a filter expression such as `Total Sales == 0`.
#[derive(Debug, Error, PartialEq)]
pub enum PredicateError {
    /// A clause is not of the form `column op literal`.
    #[error("Invalid clause: '{0}'")]
    InvalidClause(String),

    /// The literal is neither a number nor a `YYYY-MM-DD` date.
    #[error("Invalid literal '{literal}' in clause '{clause}'")]
    InvalidLiteral { clause: String, literal: String },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the custom profile registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Profile not found.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Built-in profiles cannot be replaced or deleted.
    #[error("Profile '{0}' is built in and cannot be modified")]
    BuiltIn(String),

    /// Ids become file names, so only lowercase slugs are accepted.
    #[error("Invalid profile id '{0}': use lowercase letters, digits and dashes")]
    InvalidId(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Report Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
/// `SourceUnavailable` and `MissingColumn` are the two fatal conditions of a
/// report run; everything else comes from configuration or output.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A declared source cannot be opened or read.
    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        reason: SourceError,
    },

    /// An operation needs a column absent from the row set.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// The run was given no sources.
    #[error("No sources to load")]
    NoSources,

    /// Top-N limits must be positive.
    #[error("Invalid limit: {0} (must be at least 1)")]
    InvalidLimit(usize),

    /// Filter expression error.
    #[error("Predicate error: {0}")]
    Predicate(#[from] PredicateError),

    /// Unknown profile id.
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// CSV export error.
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    /// IO error while writing output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: SourceError) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason,
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source reading.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, ReportError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let predicate_err = PredicateError::InvalidClause("Stock >".into());
        let report_err: ReportError = predicate_err.into();
        assert!(report_err.to_string().contains("Stock >"));

        let registry_err = RegistryError::NotFound("weekly".into());
        let report_err: ReportError = registry_err.into();
        assert!(report_err.to_string().contains("weekly"));
    }

    #[test]
    fn test_source_unavailable_names_source() {
        let err = ReportError::source_unavailable("dead_stock1.xlsx", SourceError::Empty);
        let msg = err.to_string();
        assert!(msg.contains("dead_stock1.xlsx"));
        assert!(msg.contains("empty"));
    }

    #[test]
    fn test_missing_column_format() {
        let err = ReportError::MissingColumn("LP Supplier".into());
        assert_eq!(err.to_string(), "Missing column: LP Supplier");
    }
}
