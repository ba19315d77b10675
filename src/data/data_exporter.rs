use crate::data::datatable::{format_datetime, DataValue};
use crate::data::result_set::ResultSet;
use crate::error::{HeimdallError, Result};
use chrono::NaiveTime;
use comfy_table::{Attribute, Cell, Table};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Excel worksheet limits
const XLSX_MAX_ROWS: usize = 1_048_576;
const XLSX_MAX_COLUMNS: usize = 16_384;

/// Largest magnitude an Excel number (f64) holds without rounding
const XLSX_MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Supported result encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Csv,
    Xlsx,
    Html,
    Text,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Json,
        OutputFormat::Yaml,
        OutputFormat::Markdown,
        OutputFormat::Csv,
        OutputFormat::Xlsx,
        OutputFormat::Html,
        OutputFormat::Text,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Html => "html",
            OutputFormat::Text => "text",
        }
    }

    /// Guess the format from an output file extension
    pub fn from_path(path: &Path) -> Option<OutputFormat> {
        let extension = path.extension()?.to_str()?;
        extension.parse().ok()
    }

    /// True for formats that should not be written to a terminal
    pub fn is_binary(&self) -> bool {
        matches!(self, OutputFormat::Xlsx)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = HeimdallError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            "html" | "htm" => Ok(OutputFormat::Html),
            "text" | "table" | "txt" => Ok(OutputFormat::Text),
            _ => Err(HeimdallError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Options shared by every encoder
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Columns to keep, in output order; all columns when `None`
    pub include: Option<Vec<String>>,

    /// Marker printed for nulls by the text encoder
    pub text_null: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include: None,
            text_null: "NULL".to_string(),
        }
    }
}

/// Encodes result sets into the supported output formats
pub struct DataExporter;

impl DataExporter {
    /// Encode `result` and write it to `writer`.
    ///
    /// The include-list is applied first and the whole document is encoded
    /// before anything is written, so a failure never leaves partial output.
    pub fn export<W: Write>(
        result: &ResultSet,
        format: OutputFormat,
        options: &ExportOptions,
        writer: &mut W,
    ) -> Result<usize> {
        let bytes = Self::export_to_bytes(result, format, options)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    pub fn export_to_bytes(
        result: &ResultSet,
        format: OutputFormat,
        options: &ExportOptions,
    ) -> Result<Vec<u8>> {
        let projected;
        let result = match &options.include {
            Some(include) => {
                projected = result.project(include)?;
                &projected
            }
            None => result,
        };

        debug!(
            format = %format,
            rows = result.row_count(),
            columns = result.column_count(),
            "Encoding result set"
        );

        match format {
            OutputFormat::Json => Self::to_json(result),
            OutputFormat::Yaml => Self::to_yaml(result),
            OutputFormat::Markdown => Ok(Self::to_markdown(result).into_bytes()),
            OutputFormat::Csv => Self::to_csv(result),
            OutputFormat::Xlsx => Self::to_xlsx(result),
            OutputFormat::Html => Ok(Self::to_html(result).into_bytes()),
            OutputFormat::Text => Ok(Self::to_text(result, &options.text_null).into_bytes()),
        }
    }

    fn to_csv(result: &ResultSet) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(result.column_names())?;
        for row in result.rows() {
            writer.write_record(row.values.iter().map(|v| v.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| HeimdallError::Encoding(format!("csv writer: {}", e)))
    }

    fn json_value(value: &DataValue) -> Result<Value> {
        Ok(match value {
            DataValue::Null => Value::Null,
            DataValue::Boolean(b) => Value::Bool(*b),
            DataValue::Integer(i) => Value::from(*i),
            DataValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| {
                    HeimdallError::Encoding(format!("{} cannot be represented in JSON", f))
                })?,
            DataValue::Text(s) => Value::String(s.clone()),
            DataValue::DateTime(dt) => Value::String(format_datetime(dt)),
        })
    }

    fn to_json(result: &ResultSet) -> Result<Vec<u8>> {
        let names = result.column_names();
        let mut records = Vec::with_capacity(result.row_count());

        for row in result.rows() {
            let mut object = serde_json::Map::new();
            for (name, value) in names.iter().zip(&row.values) {
                object.insert(name.clone(), Self::json_value(value)?);
            }
            records.push(Value::Object(object));
        }

        let mut bytes = serde_json::to_vec_pretty(&Value::Array(records))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn yaml_value(value: &DataValue) -> serde_yaml::Value {
        match value {
            DataValue::Null => serde_yaml::Value::Null,
            DataValue::Boolean(b) => serde_yaml::Value::Bool(*b),
            DataValue::Integer(i) => serde_yaml::Value::Number((*i).into()),
            DataValue::Float(f) => serde_yaml::Value::Number((*f).into()),
            DataValue::Text(s) => serde_yaml::Value::String(s.clone()),
            DataValue::DateTime(dt) => serde_yaml::Value::String(format_datetime(dt)),
        }
    }

    fn to_yaml(result: &ResultSet) -> Result<Vec<u8>> {
        let names = result.column_names();
        let records: Vec<serde_yaml::Value> = result
            .rows()
            .iter()
            .map(|row| {
                let mut mapping = serde_yaml::Mapping::new();
                for (name, value) in names.iter().zip(&row.values) {
                    mapping.insert(
                        serde_yaml::Value::String(name.clone()),
                        Self::yaml_value(value),
                    );
                }
                serde_yaml::Value::Mapping(mapping)
            })
            .collect();

        Ok(serde_yaml::to_string(&serde_yaml::Value::Sequence(records))?.into_bytes())
    }

    fn escape_markdown(text: &str) -> String {
        text.replace('|', "\\|")
            .replace("\r\n", "<br>")
            .replace(['\n', '\r'], "<br>")
    }

    fn to_markdown(result: &ResultSet) -> String {
        if result.column_count() == 0 {
            return String::new();
        }

        let header: Vec<String> = result
            .column_names()
            .iter()
            .map(|n| Self::escape_markdown(n))
            .collect();
        let mut output = format!("| {} |\n", header.join(" | "));
        output.push_str(&format!("|{}\n", " --- |".repeat(header.len())));

        for row in result.rows() {
            let cells: Vec<String> = row
                .values
                .iter()
                .map(|v| Self::escape_markdown(&v.to_string()))
                .collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output
    }

    fn escape_html(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                _ => escaped.push(ch),
            }
        }
        escaped
    }

    fn to_html(result: &ResultSet) -> String {
        let mut output = String::from("<table>\n  <thead>\n    <tr>");
        for name in result.column_names() {
            output.push_str(&format!("<th>{}</th>", Self::escape_html(&name)));
        }
        output.push_str("</tr>\n  </thead>\n  <tbody>\n");

        for row in result.rows() {
            output.push_str("    <tr>");
            for value in &row.values {
                output.push_str(&format!("<td>{}</td>", Self::escape_html(&value.to_string())));
            }
            output.push_str("</tr>\n");
        }

        output.push_str("  </tbody>\n</table>\n");
        output
    }

    fn to_text(result: &ResultSet, null_marker: &str) -> String {
        let mut table = Table::new();
        table.force_no_tty();

        if result.column_count() > 0 {
            let headers: Vec<Cell> = result
                .column_names()
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
                .collect();
            table.set_header(headers);
        }

        for row in result.rows() {
            let cells: Vec<String> = row
                .values
                .iter()
                .map(|value| match value {
                    DataValue::Null => null_marker.to_string(),
                    other => other.to_string(),
                })
                .collect();
            table.add_row(cells);
        }

        let noun = if result.row_count() == 1 { "row" } else { "rows" };
        format!("{table}\n{} {}\n", result.row_count(), noun)
    }

    fn to_xlsx(result: &ResultSet) -> Result<Vec<u8>> {
        if result.row_count() + 1 > XLSX_MAX_ROWS {
            return Err(HeimdallError::Encoding(format!(
                "{} rows exceed the xlsx limit of {} rows per sheet",
                result.row_count(),
                XLSX_MAX_ROWS - 1
            )));
        }
        if result.column_count() > XLSX_MAX_COLUMNS {
            return Err(HeimdallError::Encoding(format!(
                "{} columns exceed the xlsx limit of {} columns per sheet",
                result.column_count(),
                XLSX_MAX_COLUMNS
            )));
        }

        let mut workbook = Workbook::new();
        // fixed creation time so identical results produce identical files
        let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

        let header_format = Format::new().set_bold();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Sheet1")?;

        for (col, name) in result.column_names().iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &header_format)?;
        }

        for (row_idx, row) in result.rows().iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            for (col, value) in row.values.iter().enumerate() {
                let col = col as u16;
                match value {
                    DataValue::Null => {}
                    DataValue::Boolean(b) => {
                        worksheet.write_boolean(excel_row, col, *b)?;
                    }
                    DataValue::Integer(i) if i.unsigned_abs() > XLSX_MAX_EXACT_INTEGER as u64 => {
                        worksheet.write_string(excel_row, col, i.to_string())?;
                    }
                    DataValue::Integer(i) => {
                        worksheet.write_number(excel_row, col, *i as f64)?;
                    }
                    DataValue::Float(f) => {
                        worksheet.write_number(excel_row, col, *f)?;
                    }
                    DataValue::Text(s) => {
                        worksheet.write_string(excel_row, col, s)?;
                    }
                    DataValue::DateTime(dt) => {
                        let format = if dt.time() == NaiveTime::MIN {
                            &date_format
                        } else {
                            &datetime_format
                        };
                        worksheet.write_datetime_with_format(excel_row, col, dt, format)?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}
