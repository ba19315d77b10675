//! Read-only output of one query execution

use crate::data::datatable::{DataColumn, DataRow, DataTable, DataValue};
use crate::data::schema_inference::unique_column_names;
use crate::error::{HeimdallError, Result};

/// Schema plus ordered records produced by a query. Has no mutating API.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Vec<DataColumn>,
    rows: Vec<DataRow>,
}

impl ResultSet {
    /// Every row must be as wide as the schema
    pub fn new(columns: Vec<DataColumn>, rows: Vec<DataRow>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|row| row.len() != columns.len()) {
            return Err(HeimdallError::Schema(format!(
                "result row {} has {} values but the result has {} columns",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<DataColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get_value(&self, row: usize, col: usize) -> Option<&DataValue> {
        self.rows.get(row)?.get(col)
    }

    /// Select and reorder columns by name. Exact names win; otherwise an
    /// ASCII case-insensitive match is accepted. A column included twice gets
    /// a suffixed name so every format sees the same columns.
    pub fn project<S: AsRef<str>>(&self, include: &[S]) -> Result<ResultSet> {
        let indices = include
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.columns
                    .iter()
                    .position(|c| c.name == name)
                    .or_else(|| {
                        self.columns
                            .iter()
                            .position(|c| c.name.eq_ignore_ascii_case(name))
                    })
                    .ok_or_else(|| HeimdallError::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let names: Vec<String> = indices.iter().map(|&i| self.columns[i].name.clone()).collect();
        let columns = indices
            .iter()
            .zip(unique_column_names(&names))
            .map(|(&i, name)| DataColumn {
                name,
                ..self.columns[i].clone()
            })
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| DataRow::new(indices.iter().map(|&i| row.values[i].clone()).collect()))
            .collect();

        Ok(ResultSet { columns, rows })
    }
}

impl From<DataTable> for ResultSet {
    fn from(table: DataTable) -> Self {
        ResultSet {
            columns: table.columns,
            rows: table.rows,
        }
    }
}
