//! Load CSV and spreadsheet files into fully materialized DataTables
//!
//! Both formats are first read into a grid of raw strings. The header is taken
//! from that grid, the schema is inferred from a sampled prefix, and every row
//! is then coerced against the committed schema. Bad cells and over-wide rows
//! never abort a load; they are recorded in the returned [`LoadReport`].

use crate::data::datatable::{format_datetime, DataRow, DataTable, DataValue};
use crate::data::schema_inference::{SchemaInferrer, DEFAULT_SAMPLE_ROWS};
use crate::data::type_inference::{Coerced, CoercionFailure, TypeCoercer};
use crate::error::{HeimdallError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Kind of input file, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv { delimiter: u8 },
    Spreadsheet,
}

impl SourceKind {
    pub fn from_path(path: &Path, delimiter: Option<u8>) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| {
                HeimdallError::Schema(format!("file has no extension: {}", path.display()))
            })?;

        match extension.as_str() {
            "csv" | "txt" => Ok(SourceKind::Csv {
                delimiter: delimiter.unwrap_or(b','),
            }),
            "tsv" | "tab" => Ok(SourceKind::Csv {
                delimiter: delimiter.unwrap_or(b'\t'),
            }),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceKind::Spreadsheet),
            other => Err(HeimdallError::Schema(format!(
                "unsupported file type '.{}' for {} (use csv, tsv, xlsx, xls or ods)",
                other,
                path.display()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Csv { .. } => "csv",
            SourceKind::Spreadsheet => "spreadsheet",
        }
    }
}

/// Options controlling how a file becomes a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Rows discarded before the header
    pub skip_rows: usize,

    /// Number of header rows; more than one are flattened into single names
    pub header_rows: usize,

    /// Separator placed between the parts of a flattened multi-row header
    pub header_joiner: String,

    /// Data rows sampled for inference; `None` samples the whole file
    pub sample_rows: Option<usize>,

    /// Worksheet name for spreadsheet inputs; first sheet when unset
    pub sheet: Option<String>,

    /// CSV delimiter override
    #[serde(skip)]
    pub delimiter: Option<u8>,

    /// Detailed anomalies kept in a report; the counters are always exact
    pub anomaly_report_limit: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            header_rows: 1,
            header_joiner: "_".to_string(),
            sample_rows: Some(DEFAULT_SAMPLE_ROWS),
            sheet: None,
            delimiter: None,
            anomaly_report_limit: 20,
        }
    }
}

/// A single non-fatal event recorded during a load
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// A cell did not fit its column type and was stored as null
    Coercion {
        row: usize,
        column: String,
        failure: CoercionFailure,
    },
    /// A row had more cells than the schema; the extra cells were dropped
    Truncated {
        row: usize,
        width: usize,
        expected: usize,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::Coercion {
                row,
                column,
                failure,
            } => write!(f, "row {}, column '{}': {}, stored as null", row, column, failure),
            Anomaly::Truncated {
                row,
                width,
                expected,
            } => write!(
                f,
                "row {}: {} cells for {} columns, extra cells dropped",
                row, width, expected
            ),
        }
    }
}

/// Summary of the anomalies met while loading one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub table: String,
    pub source: String,
    pub rows_loaded: usize,
    pub coercion_failures: usize,
    pub truncated_rows: usize,
    pub padded_rows: usize,
    pub anomalies: Vec<Anomaly>,
    limit: usize,
}

impl LoadReport {
    fn new(table: &str, source: &Path, limit: usize) -> Self {
        Self {
            table: table.to_string(),
            source: source.display().to_string(),
            limit,
            ..Self::default()
        }
    }

    fn record(&mut self, anomaly: Anomaly) {
        match &anomaly {
            Anomaly::Coercion { .. } => self.coercion_failures += 1,
            Anomaly::Truncated { .. } => self.truncated_rows += 1,
        }
        if self.anomalies.len() < self.limit {
            self.anomalies.push(anomaly);
        }
    }

    /// Number of anomalies, including those beyond the detail limit
    pub fn anomaly_count(&self) -> usize {
        self.coercion_failures + self.truncated_rows
    }

    pub fn is_clean(&self) -> bool {
        self.anomaly_count() == 0
    }

    /// Human readable summary, one line plus the detailed anomalies
    pub fn summary(&self) -> String {
        let mut output = format!(
            "{} ({}): {} rows, {} coercion failures, {} truncated rows, {} padded rows",
            self.table,
            self.source,
            self.rows_loaded,
            self.coercion_failures,
            self.truncated_rows,
            self.padded_rows
        );
        for anomaly in &self.anomalies {
            output.push_str(&format!("\n  {}", anomaly));
        }
        let hidden = self.anomaly_count().saturating_sub(self.anomalies.len());
        if hidden > 0 {
            output.push_str(&format!("\n  ... and {} more", hidden));
        }
        output
    }
}

/// A table together with the report of its load
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: DataTable,
    pub report: LoadReport,
}

/// Load a CSV or spreadsheet file into a DataTable named `table_name`
pub fn load_file_to_datatable<P: AsRef<Path>>(
    path: P,
    table_name: &str,
    options: &LoadOptions,
    coercer: &TypeCoercer,
) -> Result<LoadedTable> {
    let path = path.as_ref();
    let kind = SourceKind::from_path(path, options.delimiter)?;
    let start = std::time::Instant::now();

    info!(path = %path.display(), kind = kind.name(), table = table_name, "Loading file");

    let grid = match kind {
        SourceKind::Csv { delimiter } => read_csv_grid(path, delimiter)?,
        SourceKind::Spreadsheet => read_spreadsheet_grid(path, options.sheet.as_deref())?,
    };

    let mut loaded = build_table(grid, table_name, path, options, coercer)?;
    loaded
        .table
        .metadata
        .insert("source_type".to_string(), kind.name().to_string());

    info!(
        table = table_name,
        rows = loaded.table.row_count(),
        columns = loaded.table.column_count(),
        memory_bytes = loaded.table.estimate_memory_size(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded table"
    );

    Ok(loaded)
}

/// Read every CSV record as raw strings. Ragged rows are allowed here.
/// Blank lines after the first record come back as empty rows.
fn read_csv_grid(path: &Path, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let bytes = std::fs::read(path).map_err(|e| {
        HeimdallError::Schema(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes.as_slice());

    let mut blank_lines = blank_line_positions(&bytes, b'"').into_iter().peekable();
    let mut grid: Vec<Vec<String>> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        while let Some(position) = blank_lines.next_if(|&p| p <= index) {
            if position > 0 {
                grid.push(Vec::new());
            }
        }
        grid.push(record.iter().map(|s| s.to_string()).collect());
    }

    // Strip a UTF-8 byte order mark from the very first cell
    if let Some(first) = grid.first_mut().and_then(|row: &mut Vec<String>| row.first_mut()) {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    Ok(grid)
}

/// For every empty line outside quotes, the number of records before it.
/// The csv reader skips these lines, so they are tracked separately.
fn blank_line_positions(bytes: &[u8], quote: u8) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut records = 0;
    let mut in_quotes = false;
    let mut line_has_content = false;

    let body = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    for &byte in body {
        if byte == quote {
            in_quotes = !in_quotes;
            line_has_content = true;
        } else if in_quotes {
            continue;
        } else if byte == b'\n' {
            if line_has_content {
                records += 1;
            } else {
                positions.push(records);
            }
            line_has_content = false;
        } else if byte != b'\r' {
            line_has_content = true;
        }
    }

    positions
}

/// Read one worksheet as raw strings, rendering native cells canonically
fn read_spreadsheet_grid(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(HeimdallError::Schema(format!(
                    "sheet '{}' not found in {} (available: {})",
                    name,
                    path.display(),
                    sheet_names.join(", ")
                )));
            }
            name.to_string()
        }
        None => sheet_names.first().cloned().ok_or_else(|| {
            HeimdallError::Schema(format!("{} contains no worksheets", path.display()))
        })?,
    };

    debug!(sheet = %sheet_name, "Reading worksheet");
    let range = workbook.worksheet_range(&sheet_name)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(spreadsheet_cell_to_string).collect())
        .collect())
}

fn spreadsheet_cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => format_datetime(&naive),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// Flatten the header rows into one name per column
fn flatten_headers(header_rows: &[Vec<String>], joiner: &str) -> Vec<String> {
    let width = header_rows.iter().map(Vec::len).max().unwrap_or(0);

    (0..width)
        .map(|col_idx| {
            header_rows
                .iter()
                .filter_map(|row| row.get(col_idx))
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(joiner)
        })
        .collect()
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Turn a raw grid into a typed table
pub fn build_table(
    mut grid: Vec<Vec<String>>,
    table_name: &str,
    source: &Path,
    options: &LoadOptions,
    coercer: &TypeCoercer,
) -> Result<LoadedTable> {
    let header_rows = options.header_rows.max(1);
    let header_end = options.skip_rows + header_rows;
    if grid.len() < header_end {
        return Err(HeimdallError::Schema(format!(
            "{} has no header row (expected {} header row(s) after skipping {})",
            source.display(),
            header_rows,
            options.skip_rows
        )));
    }

    while grid.len() > header_end && grid.last().is_some_and(|row| is_blank_row(row)) {
        grid.pop();
    }

    let data_rows = grid.split_off(header_end);
    let headers = flatten_headers(&grid[options.skip_rows..], &options.header_joiner);
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(HeimdallError::Schema(format!(
            "{} has an empty header row",
            source.display()
        )));
    }

    let columns = SchemaInferrer::new(coercer, options.sample_rows).infer(&headers, &data_rows);
    let width = columns.len();

    let mut table = DataTable::new(table_name);
    table
        .metadata
        .insert("source_path".to_string(), source.display().to_string());
    for column in columns {
        table.add_column(column);
    }

    let mut report = LoadReport::new(table_name, source, options.anomaly_report_limit);
    // 1-based line of the first data row in the source grid
    let first_data_line = header_end + 1;

    for (offset, raw_row) in data_rows.into_iter().enumerate() {
        let line = first_data_line + offset;

        if raw_row.len() > width {
            warn!(
                table = table_name,
                row = line,
                width = raw_row.len(),
                expected = width,
                "Row wider than header, truncating"
            );
            report.record(Anomaly::Truncated {
                row: line,
                width: raw_row.len(),
                expected: width,
            });
        } else if !raw_row.is_empty() && raw_row.len() < width {
            report.padded_rows += 1;
        }

        let mut values = Vec::with_capacity(width);
        for (col_idx, column) in table.columns.iter().enumerate() {
            let raw = raw_row.get(col_idx).map(String::as_str).unwrap_or("");
            match coercer.coerce(raw, column.data_type) {
                Coerced::Failed(failure) => {
                    debug!(
                        table = table_name,
                        row = line,
                        column = %column.name,
                        value = %failure.original,
                        "Coercion failed, storing null"
                    );
                    report.record(Anomaly::Coercion {
                        row: line,
                        column: column.name.clone(),
                        failure,
                    });
                    values.push(DataValue::Null);
                }
                coerced => values.push(coerced.into_value()),
            }
        }

        table.add_row(DataRow::new(values))?;
    }

    table.refresh_null_counts();
    report.rows_loaded = table.row_count();

    if !report.is_clean() {
        warn!(
            table = table_name,
            coercion_failures = report.coercion_failures,
            truncated_rows = report.truncated_rows,
            "Loaded with anomalies"
        );
    }

    Ok(LoadedTable { table, report })
}
