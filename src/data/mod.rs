//! Data layer
//!
//! Flat files become typed in-memory tables, tables are registered for one
//! query session, the session is queried through SQLite, and the result set
//! is encoded into one of the output formats.

// Core data modules
pub mod datatable;
pub mod result_set;
pub mod type_inference;

// Loading
pub mod datatable_loaders;
pub mod registry;
pub mod schema_inference;

// Query execution
pub mod query_executor;

// Output
pub mod data_exporter;
