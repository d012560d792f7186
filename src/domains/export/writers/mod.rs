pub mod parquet_writer;

pub use parquet_writer::{read_parquet_batches, read_parquet_summary, ParquetFileWriter, ParquetWriteStats};
