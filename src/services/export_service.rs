use crate::data::data_exporter::{ExportOptions, OutputFormat};
use crate::data::query_executor::{QueryExecutor, SqliteExecutor};
use crate::error::Result;
use crate::services::query_execution_service::{
    QueryExecutionResult, QueryExecutionService, QueryStats,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Runs SQL directly against a database and encodes the result.
/// The registry is bypassed; the encoding stage is shared with `query-file`.
pub struct ExportService;

impl ExportService {
    /// Open a SQLite database file read-only and export one query
    pub fn run_on_database<W: Write>(
        database: &Path,
        sql: &str,
        format: &str,
        export: &ExportOptions,
        writer: &mut W,
    ) -> Result<QueryExecutionResult> {
        let format: OutputFormat = format.parse()?;
        let start = Instant::now();
        let executor = SqliteExecutor::open(database)?;
        let connect_time = start.elapsed();

        let mut result = Self::run_with(&executor, sql, format, export, writer)?;
        result.stats.load_time = connect_time;
        Ok(result)
    }

    /// Export one query through an already-open executor
    pub fn run_with<E: QueryExecutor + ?Sized, W: Write>(
        executor: &E,
        sql: &str,
        format: OutputFormat,
        export: &ExportOptions,
        writer: &mut W,
    ) -> Result<QueryExecutionResult> {
        let mut stats = QueryStats::default();
        let result = QueryExecutionService::execute(executor, sql, &mut stats)?;
        QueryExecutionService::encode(&result, format, export, writer, &mut stats)?;

        Ok(QueryExecutionResult {
            stats,
            reports: Vec::new(),
            tables: Vec::new(),
            query: Some(sql.to_string()),
            format,
        })
    }
}
