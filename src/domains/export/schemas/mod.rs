pub mod postgres;

pub use postgres::{ColumnBuffer, ColumnData, ColumnKind, RecordBatchBuilder};
