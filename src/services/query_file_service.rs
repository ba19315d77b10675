use crate::data::data_exporter::{ExportOptions, OutputFormat};
use crate::data::datatable_loaders::LoadOptions;
use crate::data::query_executor::SqliteExecutor;
use crate::data::registry::TableRegistry;
use crate::data::type_inference::TypeCoercer;
use crate::error::{HeimdallError, Result};
use crate::services::data_loader_service::{DataLoaderService, InputFile};
use crate::services::query_execution_service::{
    QueryExecutionResult, QueryExecutionService, QueryStats,
};
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info};

/// Everything one `query-file` invocation needs
#[derive(Debug, Clone)]
pub struct QueryFileRequest {
    pub inputs: Vec<InputFile>,
    pub sql: String,
    /// Output format identifier, validated before any file is read
    pub format: String,
    pub export: ExportOptions,
    /// Fail instead of warning when any table loaded with anomalies
    pub strict: bool,
}

/// Queries flat files with SQL: load, register, seed, execute, encode
pub struct QueryFileService {
    loader: DataLoaderService,
}

impl QueryFileService {
    pub fn new(options: LoadOptions, coercer: TypeCoercer) -> Self {
        Self {
            loader: DataLoaderService::new(options, coercer),
        }
    }

    pub fn run<W: Write>(
        &self,
        request: &QueryFileRequest,
        writer: &mut W,
    ) -> Result<QueryExecutionResult> {
        let format: OutputFormat = request.format.parse()?;
        let mut stats = QueryStats::default();

        let load_start = Instant::now();
        let mut registry = TableRegistry::new();
        let reports = self.loader.load_all(&request.inputs, &mut registry)?;

        if request.strict {
            if let Some(report) = reports.iter().find(|r| !r.is_clean()) {
                return Err(HeimdallError::Schema(format!(
                    "strict mode: {}",
                    report.summary()
                )));
            }
        }

        let mut executor = SqliteExecutor::in_memory()?.with_coercer(self.loader.coercer().clone());
        executor.seed(&registry)?;
        stats.load_time = load_start.elapsed();

        for summary in registry.summaries() {
            debug!(table = %summary.name, schema = %summary.schema, "Registered table");
        }

        let result = QueryExecutionService::execute(&executor, &request.sql, &mut stats)?;
        QueryExecutionService::encode(&result, format, &request.export, writer, &mut stats)?;

        info!(
            tables = registry.len(),
            rows = stats.row_count,
            "query-file complete"
        );

        Ok(QueryExecutionResult {
            stats,
            reports,
            tables: registry.summaries(),
            query: Some(request.sql.clone()),
            format,
        })
    }
}
