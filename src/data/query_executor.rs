//! SQL execution against an ephemeral or existing SQLite database
//!
//! File-backed queries seed an in-memory SQLite database with one regular table
//! per registered virtual table and run the user's statement against it. The
//! direct-database path opens an existing SQLite file read-only. Both paths
//! produce the same [`ResultSet`].

use crate::data::datatable::{
    format_datetime, parse_stored_datetime, DataColumn, DataRow, DataType, DataValue,
};
use crate::data::registry::TableRegistry;
use crate::data::result_set::ResultSet;
use crate::data::schema_inference::unique_column_names;
use crate::data::type_inference::{Coerced, TypeCoercer};
use crate::error::{HeimdallError, Result};
use base64::Engine;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Trait for executing SQL queries against a relational engine
pub trait QueryExecutor {
    /// Run one statement once and collect its rows
    fn execute(&self, query: &str) -> Result<ResultSet>;
}

/// Quote an identifier for SQLite
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &DataValue) -> Value {
    match value {
        DataValue::Null => Value::Null,
        DataValue::Boolean(b) => Value::Integer(i64::from(*b)),
        DataValue::Integer(i) => Value::Integer(*i),
        DataValue::Float(f) => Value::Real(*f),
        DataValue::Text(s) => Value::Text(s.clone()),
        DataValue::DateTime(dt) => Value::Text(format_datetime(dt)),
    }
}

/// SQLite-backed executor
pub struct SqliteExecutor {
    conn: Connection,
    file_backed: bool,
    coercer: TypeCoercer,
}

impl SqliteExecutor {
    /// Ephemeral in-memory database for querying virtual tables
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            HeimdallError::Query(format!("Failed to open in-memory SQLite database: {}", e))
        })?;
        debug!("SQLite query engine initialized (in-memory)");

        Ok(Self {
            conn,
            file_backed: true,
            coercer: TypeCoercer::default(),
        })
    }

    /// Open an existing SQLite database file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            HeimdallError::Query(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Opened SQLite database");

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            file_backed: false,
            coercer: TypeCoercer::default(),
        }
    }

    /// Coercer used to read declared DATETIME text columns back into date/times
    pub fn with_coercer(mut self, coercer: TypeCoercer) -> Self {
        self.coercer = coercer;
        self
    }

    /// Create and fill one SQLite table per registered table, in one transaction
    pub fn seed(&mut self, registry: &TableRegistry) -> Result<()> {
        let start = Instant::now();
        let tx = self.conn.transaction()?;

        for table in registry.iter() {
            let table_ident = quote_identifier(&table.name);
            let column_defs: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", quote_identifier(&c.name), c.data_type.sql_type()))
                .collect();

            tx.execute_batch(&format!(
                "CREATE TABLE {} ({})",
                table_ident,
                column_defs.join(", ")
            ))
            .map_err(|e| {
                HeimdallError::Query(format!("Failed to create table '{}': {}", table.name, e))
            })?;

            let placeholders: Vec<String> =
                (1..=table.column_count()).map(|i| format!("?{}", i)).collect();
            let insert_sql = format!(
                "INSERT INTO {} VALUES ({})",
                table_ident,
                placeholders.join(", ")
            );

            {
                let mut stmt = tx.prepare_cached(&insert_sql)?;
                for row in &table.rows {
                    stmt.execute(params_from_iter(row.values.iter().map(to_sql_value)))?;
                }
            }

            debug!(
                table = %table.name,
                rows = table.row_count(),
                "Seeded SQLite table"
            );
        }

        tx.commit()?;
        info!(
            tables = registry.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Seeded query engine"
        );
        Ok(())
    }

    fn read_value(&self, value: ValueRef<'_>, declared: Option<DataType>) -> DataValue {
        match value {
            ValueRef::Null => DataValue::Null,
            ValueRef::Integer(n) => match declared {
                Some(DataType::Boolean) => DataValue::Boolean(n != 0),
                _ => DataValue::Integer(n),
            },
            ValueRef::Real(f) => DataValue::Float(f),
            ValueRef::Text(bytes) => {
                let text = String::from_utf8_lossy(bytes).to_string();
                if declared == Some(DataType::DateTime) {
                    // seeded tables always hold the canonical form; other
                    // databases may use any configured format
                    if let Some(dt) = parse_stored_datetime(&text) {
                        return DataValue::DateTime(dt);
                    }
                    if let Coerced::Value(value) = self.coercer.coerce(&text, DataType::DateTime) {
                        return value;
                    }
                }
                DataValue::Text(text)
            }
            ValueRef::Blob(b) => DataValue::Text(base64::engine::general_purpose::STANDARD.encode(b)),
        }
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &str) -> Result<ResultSet> {
        let start = Instant::now();
        crate::trace_query!(query);

        let mut stmt = self.conn.prepare(query)?;

        if self.file_backed && !stmt.readonly() {
            warn!("Statement modifies the ephemeral database; changes are discarded after this query");
        }

        let declared: Vec<(String, Option<DataType>)> = stmt
            .columns()
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    c.decl_type().and_then(DataType::from_declared),
                )
            })
            .collect();
        let column_count = declared.len();

        let mut data_rows = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for (idx, (_, decl)) in declared.iter().enumerate() {
                values.push(self.read_value(row.get_ref(idx)?, *decl));
            }
            data_rows.push(DataRow::new(values));
        }

        // SQLite allows repeated result names (`SELECT a.id, b.id`); a schema does not
        let raw_names: Vec<String> = declared.iter().map(|(name, _)| name.clone()).collect();
        let names = unique_column_names(&raw_names);

        let columns = declared
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(idx, ((_, decl), name))| {
                let mut data_type = decl;
                let mut null_count = 0;
                for row in &data_rows {
                    match row.values[idx].data_type() {
                        Some(observed) => {
                            data_type = Some(match data_type {
                                Some(current) => current.merge(&observed),
                                None => observed,
                            });
                        }
                        None => null_count += 1,
                    }
                }
                DataColumn {
                    name,
                    data_type: data_type.unwrap_or(DataType::Text),
                    nullable: null_count > 0 || data_rows.is_empty(),
                    null_count,
                }
            })
            .collect();

        let result = ResultSet::new(columns, data_rows)?;
        info!(
            target: "query",
            rows = result.row_count(),
            columns = result.column_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );
        Ok(result)
    }
}
