pub mod convert_service;
pub mod data_loader_service;
pub mod export_service;
pub mod query_execution_service;
pub mod query_file_service;

pub use convert_service::ConvertService;
pub use data_loader_service::{DataLoaderService, InputFile};
pub use export_service::ExportService;
pub use query_execution_service::{QueryExecutionResult, QueryExecutionService, QueryStats};
pub use query_file_service::{QueryFileRequest, QueryFileService};
