//! Tables loaded for one query invocation, addressable by name

use crate::data::datatable::DataTable;
use crate::error::{HeimdallError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Name, size and schema of a registered table, for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub schema: String,
}

/// Holds the virtual tables of one session in registration order.
///
/// Names are matched ASCII case-insensitively, the way SQLite resolves identifiers.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Vec<DataTable>,
    index: HashMap<String, usize>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the next table gets when no alias is supplied: `table_<position>`
    pub fn default_name(&self) -> String {
        format!("table_{}", self.tables.len())
    }

    /// Register a table under `name`, or under the default name when `None`.
    /// The table is renamed to the registered name, which is returned.
    pub fn register(&mut self, mut table: DataTable, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(alias) => alias.to_string(),
            None => self.default_name(),
        };

        let key = name.to_ascii_lowercase();
        if self.index.contains_key(&key) {
            return Err(HeimdallError::DuplicateTable(name));
        }

        debug!(
            table = %name,
            rows = table.row_count(),
            columns = table.column_count(),
            "Registering table"
        );

        table.name = name.clone();
        self.index.insert(key, self.tables.len());
        self.tables.push(table);
        Ok(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&DataTable> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| &self.tables[idx])
            .ok_or_else(|| HeimdallError::TableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// Tables in registration order
    pub fn iter(&self) -> impl Iterator<Item = &DataTable> {
        self.tables.iter()
    }

    /// Consume the registry, yielding tables in registration order
    pub fn into_tables(self) -> impl Iterator<Item = DataTable> {
        self.tables.into_iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn summaries(&self) -> Vec<TableSummary> {
        self.tables
            .iter()
            .map(|table| TableSummary {
                name: table.name.clone(),
                rows: table.row_count(),
                columns: table.column_count(),
                schema: table.schema_summary(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datatable::DataColumn;

    fn table(name: &str) -> DataTable {
        let mut table = DataTable::new(name);
        table.add_column(DataColumn::new("id"));
        table
    }

    #[test]
    fn test_default_names_follow_position() {
        let mut registry = TableRegistry::new();
        assert_eq!(registry.register(table("a"), None).unwrap(), "table_0");
        assert_eq!(registry.register(table("b"), Some("users")).unwrap(), "users");
        assert_eq!(registry.register(table("c"), None).unwrap(), "table_2");

        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["table_0", "users", "table_2"]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = TableRegistry::new();
        registry.register(table("a"), Some("users")).unwrap();
        let err = registry.register(table("b"), Some("USERS")).unwrap_err();
        assert!(matches!(err, HeimdallError::DuplicateTable(name) if name == "USERS"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_colliding_with_default_name() {
        let mut registry = TableRegistry::new();
        registry.register(table("a"), Some("table_1")).unwrap();
        let err = registry.register(table("b"), None).unwrap_err();
        assert!(matches!(err, HeimdallError::DuplicateTable(_)));
    }

    #[test]
    fn test_resolve() {
        let mut registry = TableRegistry::new();
        registry.register(table("a"), None).unwrap();

        assert_eq!(registry.resolve("TABLE_0").unwrap().name, "table_0");
        assert!(matches!(
            registry.resolve("missing"),
            Err(HeimdallError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_summaries() {
        let mut registry = TableRegistry::new();
        registry.register(table("a"), None).unwrap();
        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "table_0");
        assert_eq!(summaries[0].columns, 1);
        assert_eq!(summaries[0].schema, "id:text(nullable)");
    }
}
