//! Error types for heimdall
//!
//! Library operations return [`Result`]. Per-cell coercion problems are not errors:
//! they are recorded as anomalies in a `LoadReport` and the affected cell becomes null.

use thiserror::Error;

/// Result type alias for heimdall operations
pub type Result<T> = std::result::Result<T, HeimdallError>;

#[derive(Debug, Error)]
pub enum HeimdallError {
    /// Unreadable header, unsupported file type or structure
    #[error("schema error: {0}")]
    Schema(String),

    /// The SQL engine rejected or failed the statement. Carries the engine message as-is.
    #[error("query error: {0}")]
    Query(String),

    /// Format-specific serialization failure
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("unsupported output format '{0}' (supported: json, yaml, markdown, csv, xlsx, html, text)")]
    UnsupportedFormat(String),

    #[error("table '{0}' is already registered")]
    DuplicateTable(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// An include-list named a column the result set does not have
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl HeimdallError {
    /// Short stable name for the error category, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            HeimdallError::Schema(_) => "schema",
            HeimdallError::Query(_) => "query",
            HeimdallError::Encoding(_) => "encoding",
            HeimdallError::UnsupportedFormat(_) => "unsupported_format",
            HeimdallError::DuplicateTable(_) => "duplicate_table",
            HeimdallError::TableNotFound(_) => "table_not_found",
            HeimdallError::UnknownColumn(_) => "unknown_column",
            HeimdallError::Io(_) => "io",
            HeimdallError::Csv(_) => "csv",
        }
    }
}

impl From<rusqlite::Error> for HeimdallError {
    fn from(err: rusqlite::Error) -> Self {
        HeimdallError::Query(err.to_string())
    }
}

impl From<calamine::Error> for HeimdallError {
    fn from(err: calamine::Error) -> Self {
        HeimdallError::Schema(format!("failed to read spreadsheet: {}", err))
    }
}

impl From<rust_xlsxwriter::XlsxError> for HeimdallError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        HeimdallError::Encoding(format!("xlsx: {}", err))
    }
}

impl From<serde_json::Error> for HeimdallError {
    fn from(err: serde_json::Error) -> Self {
        HeimdallError::Encoding(format!("json: {}", err))
    }
}

impl From<serde_yaml::Error> for HeimdallError {
    fn from(err: serde_yaml::Error) -> Self {
        HeimdallError::Encoding(format!("yaml: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_keeps_engine_message() {
        let err = HeimdallError::Query("no such table: table_9".to_string());
        assert!(err.to_string().contains("no such table: table_9"));
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = HeimdallError::UnsupportedFormat("pdf".to_string());
        assert!(err.to_string().contains("'pdf'"));
    }
}
