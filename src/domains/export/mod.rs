pub mod types;
pub mod schemas;
pub mod writers;
pub mod repository;
pub mod service;

pub use service::ExportService;
pub use repository::{PostgresTableSource, TableSource};
pub use writers::{read_parquet_summary, ParquetFileWriter};
pub use types::{ExportReport, ExportStage, ExportSummary};
