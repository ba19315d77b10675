use crate::data::data_exporter::{DataExporter, ExportOptions, OutputFormat};
use crate::data::datatable_loaders::LoadReport;
use crate::data::query_executor::QueryExecutor;
use crate::data::registry::TableSummary;
use crate::data::result_set::ResultSet;
use crate::error::Result;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::info;

/// Result of one command invocation. The encoded document itself went to the writer.
#[derive(Debug, Clone)]
pub struct QueryExecutionResult {
    /// Execution statistics
    pub stats: QueryStats,

    /// One report per loaded file, in argument order
    pub reports: Vec<LoadReport>,

    /// Tables that were registered for the query
    pub tables: Vec<TableSummary>,

    /// The statement that was executed, if any
    pub query: Option<String>,

    pub format: OutputFormat,
}

impl QueryExecutionResult {
    /// Anomalies across every loaded table
    pub fn anomaly_count(&self) -> usize {
        self.reports.iter().map(|r| r.anomaly_count()).sum()
    }
}

/// Statistics about query execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub row_count: usize,
    pub column_count: usize,
    pub bytes_written: usize,
    pub load_time: Duration,
    pub execution_time: Duration,
    pub encode_time: Duration,
}

impl QueryStats {
    pub fn total_time(&self) -> Duration {
        self.load_time + self.execution_time + self.encode_time
    }

    /// One line summary for the status output
    pub fn status_message(&self) -> String {
        let noun = if self.row_count == 1 { "row" } else { "rows" };
        format!(
            "{} {} × {} columns in {:.1}ms (load {:.1}ms, query {:.1}ms, encode {:.1}ms)",
            self.row_count,
            noun,
            self.column_count,
            self.total_time().as_secs_f64() * 1000.0,
            self.load_time.as_secs_f64() * 1000.0,
            self.execution_time.as_secs_f64() * 1000.0,
            self.encode_time.as_secs_f64() * 1000.0,
        )
    }
}

/// Runs a statement on any executor and encodes the result, timing both steps
pub struct QueryExecutionService;

impl QueryExecutionService {
    pub fn execute<E: QueryExecutor + ?Sized>(
        executor: &E,
        sql: &str,
        stats: &mut QueryStats,
    ) -> Result<ResultSet> {
        let start = Instant::now();
        let result = executor.execute(sql)?;
        stats.execution_time = start.elapsed();
        stats.row_count = result.row_count();
        stats.column_count = result.column_count();
        Ok(result)
    }

    pub fn encode<W: Write>(
        result: &ResultSet,
        format: OutputFormat,
        options: &ExportOptions,
        writer: &mut W,
        stats: &mut QueryStats,
    ) -> Result<()> {
        let start = Instant::now();
        stats.bytes_written = DataExporter::export(result, format, options, writer)?;
        stats.encode_time = start.elapsed();
        if let Some(include) = &options.include {
            stats.column_count = include.len();
        }

        info!(
            format = %format,
            bytes = stats.bytes_written,
            elapsed_ms = stats.encode_time.as_millis() as u64,
            "Encoded result"
        );
        Ok(())
    }
}
