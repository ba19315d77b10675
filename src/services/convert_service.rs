use crate::data::data_exporter::{ExportOptions, OutputFormat};
use crate::data::datatable_loaders::LoadOptions;
use crate::data::registry::TableRegistry;
use crate::data::result_set::ResultSet;
use crate::data::type_inference::TypeCoercer;
use crate::error::{HeimdallError, Result};
use crate::services::data_loader_service::{DataLoaderService, InputFile};
use crate::services::query_execution_service::{
    QueryExecutionResult, QueryExecutionService, QueryStats,
};
use std::io::Write;
use std::time::Instant;

/// Re-encodes one flat file in another format without going through SQL
pub struct ConvertService {
    loader: DataLoaderService,
}

impl ConvertService {
    pub fn new(options: LoadOptions, coercer: TypeCoercer) -> Self {
        Self {
            loader: DataLoaderService::new(options, coercer),
        }
    }

    pub fn run<W: Write>(
        &self,
        input: &InputFile,
        format: &str,
        export: &ExportOptions,
        writer: &mut W,
    ) -> Result<QueryExecutionResult> {
        let format: OutputFormat = format.parse()?;
        let mut stats = QueryStats::default();

        let load_start = Instant::now();
        let mut registry = TableRegistry::new();
        let report = self.loader.load_file(input, &mut registry)?;
        let tables = registry.summaries();
        stats.load_time = load_start.elapsed();

        let table = registry
            .into_tables()
            .next()
            .ok_or_else(|| HeimdallError::TableNotFound(report.table.clone()))?;
        let result = ResultSet::from(table);
        stats.row_count = result.row_count();
        stats.column_count = result.column_count();

        QueryExecutionService::encode(&result, format, export, writer, &mut stats)?;

        Ok(QueryExecutionResult {
            stats,
            reports: vec![report],
            tables,
            query: None,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_convert_csv_to_markdown_with_projection() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"id,name,age\n1,Alice,30\n2,Bob,\n").unwrap();

        let export = ExportOptions {
            include: Some(vec!["name".to_string(), "id".to_string()]),
            ..ExportOptions::default()
        };
        let service = ConvertService::new(LoadOptions::default(), TypeCoercer::default());
        let mut output = Vec::new();
        let result = service
            .run(&InputFile::new(file.path()), "md", &export, &mut output)
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "| name | id |\n| --- | --- |\n| Alice | 1 |\n| Bob | 2 |\n"
        );
        assert_eq!(result.stats.row_count, 2);
        assert_eq!(result.stats.column_count, 2);
        assert!(result.query.is_none());
        assert_eq!(result.tables[0].schema, "id:integer, name:text, age:integer(nullable)");
    }

    #[test]
    fn test_convert_unknown_include_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"id\n1\n").unwrap();

        let export = ExportOptions {
            include: Some(vec!["nope".to_string()]),
            ..ExportOptions::default()
        };
        let service = ConvertService::new(LoadOptions::default(), TypeCoercer::default());
        let mut output = Vec::new();
        let err = service
            .run(&InputFile::new(file.path()), "json", &export, &mut output)
            .unwrap_err();
        assert!(matches!(err, HeimdallError::UnknownColumn(_)));
        assert!(output.is_empty());
    }
}
