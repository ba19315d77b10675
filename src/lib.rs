//! heimdall: query CSV and spreadsheet files with SQL and encode the results
//!
//! Files are loaded into typed virtual tables, registered under a name, and
//! queried through an embedded SQLite engine. Results from flat files and from
//! SQLite databases share the same encoders.

pub mod config;
pub mod data;
pub mod error;
pub mod services;
pub mod utils;

pub use data::data_exporter::{DataExporter, ExportOptions, OutputFormat};
pub use data::datatable::{DataColumn, DataRow, DataTable, DataType, DataValue};
pub use data::datatable_loaders::{load_file_to_datatable, LoadOptions, LoadReport};
pub use data::query_executor::{QueryExecutor, SqliteExecutor};
pub use data::registry::TableRegistry;
pub use data::result_set::ResultSet;
pub use data::type_inference::{CoercionOptions, TypeCoercer};
pub use error::{HeimdallError, Result};
