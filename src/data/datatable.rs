use crate::error::{HeimdallError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Represents the data type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    DateTime,
    Text,
}

impl DataType {
    /// Inference ladder, most specific first. Text never fails.
    pub const LADDER: [DataType; 5] = [
        DataType::Boolean,
        DataType::Integer,
        DataType::Float,
        DataType::DateTime,
        DataType::Text,
    ];

    /// Merge two types observed in the same result column
    pub fn merge(&self, other: &DataType) -> DataType {
        if self == other {
            return *self;
        }

        match (self, other) {
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            _ => DataType::Text,
        }
    }

    /// Declared column type used when seeding the SQL engine
    pub fn sql_type(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Integer => "INTEGER",
            DataType::Float => "REAL",
            DataType::DateTime => "DATETIME",
            DataType::Text => "TEXT",
        }
    }

    /// Map a declared SQL column type back to a DataType
    pub fn from_declared(decl: &str) -> Option<DataType> {
        let upper = decl.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }

        // Order follows SQLite's affinity rules
        if upper.contains("INT") {
            Some(DataType::Integer)
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Some(DataType::Text)
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Some(DataType::Float)
        } else if upper.contains("BOOL") {
            Some(DataType::Boolean)
        } else if upper.contains("DATE") || upper.contains("TIME") {
            Some(DataType::DateTime)
        } else {
            None
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::DateTime => "datetime",
            DataType::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// Column metadata and definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub null_count: usize,
}

impl DataColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Text,
            nullable: true,
            null_count: 0,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

impl fmt::Display for DataColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}:{}(nullable)", self.name, self.data_type)
        } else {
            write!(f, "{}:{}", self.name, self.data_type)
        }
    }
}

/// A single cell value in the table
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Type tag of the value, `None` for null
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            DataValue::Null => None,
            DataValue::Boolean(_) => Some(DataType::Boolean),
            DataValue::Integer(_) => Some(DataType::Integer),
            DataValue::Float(_) => Some(DataType::Float),
            DataValue::Text(_) => Some(DataType::Text),
            DataValue::DateTime(_) => Some(DataType::DateTime),
        }
    }
}

/// Render a date/time the way it is stored and displayed everywhere:
/// date only at midnight, otherwise seconds plus any fractional part.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time().num_seconds_from_midnight() == 0 && dt.time().nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

/// Parse text written by [`format_datetime`]. Independent of any configured
/// coercion formats.
pub fn parse_stored_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, ""),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Integer(i) => write!(f, "{}", i),
            // integral floats keep a decimal point so they read back as floats
            DataValue::Float(fl) if fl.is_finite() && fl.fract() == 0.0 && fl.abs() < 1e15 => {
                write!(f, "{:.1}", fl)
            }
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "{}", s),
            DataValue::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
        }
    }
}

/// A row of data in the table
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub values: Vec<DataValue>,
}

impl DataRow {
    pub fn new(values: Vec<DataValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An in-memory relation loaded from a flat file
#[derive(Debug, Clone)]
pub struct DataTable {
    pub name: String,
    pub columns: Vec<DataColumn>,
    pub rows: Vec<DataRow>,
    pub metadata: HashMap<String, String>,
}

impl DataTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn add_column(&mut self, column: DataColumn) -> &mut Self {
        self.columns.push(column);
        self
    }

    pub fn add_row(&mut self, row: DataRow) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(HeimdallError::Schema(format!(
                "Row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names as a vector
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Get a value at specific row and column
    pub fn get_value(&self, row: usize, col: usize) -> Option<&DataValue> {
        self.rows.get(row)?.get(col)
    }

    /// Get a value by row index and column name
    pub fn get_value_by_name(&self, row: usize, col_name: &str) -> Option<&DataValue> {
        let col_idx = self.get_column_index(col_name)?;
        self.get_value(row, col_idx)
    }

    /// Recount nulls per column and raise the nullable flag where nulls were found.
    /// Column types are never touched here.
    pub fn refresh_null_counts(&mut self) {
        for (col_idx, column) in self.columns.iter_mut().enumerate() {
            let null_count = self
                .rows
                .iter()
                .filter(|row| row.get(col_idx).map_or(true, DataValue::is_null))
                .count();
            column.null_count = null_count;
            if null_count > 0 {
                column.nullable = true;
            }
        }
    }

    /// One-line schema description, e.g. `id:integer, name:text`
    pub fn schema_summary(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generate a debug dump string for display
    pub fn debug_dump(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("DataTable: {}\n", self.name));
        output.push_str(&format!(
            "Rows: {} | Columns: {}\n",
            self.row_count(),
            self.column_count()
        ));

        if !self.metadata.is_empty() {
            let mut keys: Vec<_> = self.metadata.keys().collect();
            keys.sort();
            output.push_str("Metadata:\n");
            for key in keys {
                output.push_str(&format!("  {}: {}\n", key, self.metadata[key]));
            }
        }

        output.push_str("\nColumns:\n");
        for column in &self.columns {
            output.push_str(&format!("  {} ({})", column.name, column.data_type));
            if column.nullable {
                output.push_str(&format!(" - nullable, {} nulls", column.null_count));
            }
            output.push('\n');
        }

        if self.row_count() > 0 {
            let sample_size = 5.min(self.row_count());
            output.push_str(&format!("\nFirst {} rows:\n", sample_size));

            for row_idx in 0..sample_size {
                let rendered: Vec<String> = self.rows[row_idx]
                    .values
                    .iter()
                    .map(|v| v.to_string())
                    .collect();
                output.push_str(&format!("  [{}]: {}\n", row_idx, rendered.join(", ")));
            }
        }

        output
    }

    pub fn estimate_memory_size(&self) -> usize {
        let mut size = std::mem::size_of::<Self>();

        size += self.columns.len() * std::mem::size_of::<DataColumn>();
        for col in &self.columns {
            size += col.name.len();
        }

        size += self.rows.len() * std::mem::size_of::<DataRow>();
        for row in &self.rows {
            for value in &row.values {
                size += std::mem::size_of::<DataValue>();
                if let DataValue::Text(s) = value {
                    size += s.len();
                }
            }
        }

        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_datatable_creation() {
        let mut table = DataTable::new("test");

        table.add_column(DataColumn::new("id").with_type(DataType::Integer));
        table.add_column(DataColumn::new("name").with_type(DataType::Text));
        table.add_column(DataColumn::new("active").with_type(DataType::Boolean));

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row_count(), 0);

        let row = DataRow::new(vec![
            DataValue::Integer(1),
            DataValue::Text("Alice".to_string()),
            DataValue::Boolean(true),
        ]);

        table.add_row(row).unwrap();
        assert_eq!(table.row_count(), 1);

        let value = table.get_value_by_name(0, "name").unwrap();
        assert_eq!(value.to_string(), "Alice");
    }

    #[test]
    fn test_add_row_rejects_partial_records() {
        let mut table = DataTable::new("test");
        table.add_column(DataColumn::new("a"));
        table.add_column(DataColumn::new("b"));

        let err = table
            .add_row(DataRow::new(vec![DataValue::Integer(1)]))
            .unwrap_err();
        assert!(matches!(err, HeimdallError::Schema(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_type_merge() {
        assert_eq!(DataType::Integer.merge(&DataType::Float), DataType::Float);
        assert_eq!(DataType::Float.merge(&DataType::Integer), DataType::Float);
        assert_eq!(DataType::Integer.merge(&DataType::Integer), DataType::Integer);
        assert_eq!(DataType::Boolean.merge(&DataType::Integer), DataType::Text);
        assert_eq!(DataType::DateTime.merge(&DataType::Text), DataType::Text);
    }

    #[test]
    fn test_declared_type_round_trip() {
        for data_type in DataType::LADDER {
            assert_eq!(DataType::from_declared(data_type.sql_type()), Some(data_type));
        }
        assert_eq!(DataType::from_declared("VARCHAR(20)"), Some(DataType::Text));
        assert_eq!(DataType::from_declared("BIGINT"), Some(DataType::Integer));
        assert_eq!(DataType::from_declared(""), None);
        assert_eq!(DataType::from_declared("BLOB"), None);
    }

    #[test]
    fn test_datetime_display() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(DataValue::DateTime(midnight).to_string(), "2024-01-15");

        let afternoon = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap();
        assert_eq!(
            DataValue::DateTime(afternoon).to_string(),
            "2024-01-15 14:30:05"
        );
    }

    #[test]
    fn test_float_display_keeps_decimal_point() {
        assert_eq!(DataValue::Float(3.0).to_string(), "3.0");
        assert_eq!(DataValue::Float(-2.5).to_string(), "-2.5");
        assert_eq!(DataValue::Float(1e20).to_string(), "100000000000000000000");
    }

    #[test]
    fn test_refresh_null_counts_raises_nullable_only() {
        let mut table = DataTable::new("test");
        let mut age = DataColumn::new("age").with_type(DataType::Integer);
        age.nullable = false;
        table.add_column(age);
        table
            .add_row(DataRow::new(vec![DataValue::Integer(30)]))
            .unwrap();
        table.add_row(DataRow::new(vec![DataValue::Null])).unwrap();

        table.refresh_null_counts();

        assert_eq!(table.columns[0].data_type, DataType::Integer);
        assert_eq!(table.columns[0].null_count, 1);
        assert!(table.columns[0].nullable);
        assert_eq!(table.schema_summary(), "age:integer(nullable)");
    }

    #[test]
    fn test_stored_datetimes_parse_back() {
        let precise = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(9, 30, 0, 250)
            .unwrap();
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for dt in [precise, midnight] {
            assert_eq!(parse_stored_datetime(&format_datetime(&dt)), Some(dt));
        }
        assert_eq!(parse_stored_datetime("15.01.2024"), None);
    }

    #[test]
    fn test_debug_dump_lists_columns_and_rows() {
        let mut table = DataTable::new("people");
        table.add_column(DataColumn::new("id").with_type(DataType::Integer));
        table.add_column(DataColumn::new("name"));
        table
            .add_row(DataRow::new(vec![
                DataValue::Integer(1),
                DataValue::Text("Alice".to_string()),
            ]))
            .unwrap();
        table.add_row(DataRow::new(vec![DataValue::Integer(2), DataValue::Null])).unwrap();
        table.refresh_null_counts();

        let dump = table.debug_dump();
        assert!(dump.starts_with("DataTable: people\nRows: 2 | Columns: 2\n"));
        assert!(dump.contains("  name (text) - nullable, 1 nulls\n"));
        assert!(dump.contains("  [0]: 1, Alice\n"));
    }
}
