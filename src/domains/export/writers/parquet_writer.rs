use crate::domains::export::types::ExportSummary;
use crate::errors::{ExportError, ExportResult};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use parquet::arrow::{AsyncArrowWriter, ParquetRecordBatchStreamBuilder};
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::File;

/// Outcome of writing one Parquet file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetWriteStats {
    pub rows_written: usize,
    pub bytes_written: u64,
    pub duration_ms: u64,
}

/// Writes a materialized result set to a Snappy-compressed Parquet file
#[derive(Debug, Clone)]
pub struct ParquetFileWriter {
    compression: Compression,
    created_by: String,
}

impl Default for ParquetFileWriter {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            created_by: format!("transactions-pipeline {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ParquetFileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_dictionary_enabled(true)
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_created_by(self.created_by.clone())
            .build()
    }

    /// Write `batch` to `path`, replacing any existing file.
    ///
    /// Missing parent directories are created. Data goes to a hidden sibling file
    /// first and is renamed over `path` only once the footer is written, so a failure
    /// leaves any previous output untouched.
    pub async fn write_batch(&self, path: &Path, batch: &RecordBatch) -> ExportResult<ParquetWriteStats> {
        let start_time = Instant::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(path)?;
        if let Err(e) = self.write_to(&temp_path, batch).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                log::debug!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(e);
        }
        tokio::fs::rename(&temp_path, path).await?;

        let bytes_written = tokio::fs::metadata(path).await?.len();
        let stats = ParquetWriteStats {
            rows_written: batch.num_rows(),
            bytes_written,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        log::debug!(
            "Parquet file {} written: {} rows, {} bytes in {} ms",
            path.display(),
            stats.rows_written,
            stats.bytes_written,
            stats.duration_ms
        );

        Ok(stats)
    }

    async fn write_to(&self, path: &Path, batch: &RecordBatch) -> ExportResult<()> {
        let file = File::create(path).await?;
        let mut writer = AsyncArrowWriter::try_new(file, batch.schema(), Some(self.writer_properties()))?;
        writer.write(batch).await?;
        writer.close().await?;
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> ExportResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ExportError::Io(format!("Output path {} has no file name", path.display())))?;
    let mut temp_name = OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

/// Read a Parquet file back into memory
pub async fn read_parquet_batches(path: &Path) -> ExportResult<Vec<RecordBatch>> {
    let file = File::open(path).await?;
    let stream = ParquetRecordBatchStreamBuilder::new(file).await?.build()?;
    Ok(stream.try_collect().await?)
}

/// Recompute the export summary from a written file
pub async fn read_parquet_summary(path: &Path) -> ExportResult<ExportSummary> {
    let batches = read_parquet_batches(path).await?;
    ExportSummary::from_batches(&batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{APPROVED_AMOUNT_COLUMN, APPROVED_COUNT_COLUMN};
    use arrow::array::{Array, Decimal128Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("bin", DataType::Utf8, true),
            Field::new("day", DataType::Utf8, true),
            Field::new(APPROVED_COUNT_COLUMN, DataType::Int64, true),
            Field::new(APPROVED_AMOUNT_COLUMN, DataType::Decimal128(38, 0), true),
        ]));
        let amounts = Decimal128Array::from(vec![Some(1_000_000_i128), Some(250), None])
            .with_precision_and_scale(38, 0)
            .unwrap();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["400000", "400000", "510000"])),
                Arc::new(StringArray::from(vec!["2024-01-01", "2024-01-02", "2024-01-01"])),
                Arc::new(Int64Array::from(vec![Some(12), Some(3), None])),
                Arc::new(amounts),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_creates_directories_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/exports/transactions_summary.parquet");
        let batch = sample_batch();

        let stats = ParquetFileWriter::new().write_batch(&path, &batch).await.unwrap();
        assert_eq!(stats.rows_written, 3);
        assert!(stats.bytes_written > 0);
        assert!(path.exists());
        assert!(!temp_path_for(&path).unwrap().exists());

        let batches = read_parquet_batches(&path).await.unwrap();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 3);

        // Same columns in the same order, no extra index column
        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["bin", "day", APPROVED_COUNT_COLUMN, APPROVED_AMOUNT_COLUMN]);

        let days = batches[0].column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(days.value(0), "2024-01-01");
        assert_eq!(days.value(1), "2024-01-02");
        assert!(batches[0].column(2).is_null(2));
    }

    #[tokio::test]
    async fn test_summary_survives_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.parquet");
        let batch = sample_batch();

        ParquetFileWriter::new().write_batch(&path, &batch).await.unwrap();

        let written = read_parquet_summary(&path).await.unwrap();
        assert_eq!(written, ExportSummary::from_batch(&batch).unwrap());
        assert_eq!(written.rows, 3);
        assert_eq!(written.approved_transactions, dec!(15));
        assert_eq!(written.approved_amount, dec!(1000250));
    }

    #[tokio::test]
    async fn test_file_is_snappy_compressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.parquet");
        ParquetFileWriter::new().write_batch(&path, &sample_batch()).await.unwrap();

        let reader = SerializedFileReader::new(std::fs::File::open(&path).unwrap()).unwrap();
        let row_group = reader.metadata().row_group(0);
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
    }

    #[tokio::test]
    async fn test_existing_output_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.parquet");
        std::fs::write(&path, b"stale contents").unwrap();

        ParquetFileWriter::new().write_batch(&path, &sample_batch()).await.unwrap();

        let summary = read_parquet_summary(&path).await.unwrap();
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("out/summary.parquet")).unwrap();
        assert_eq!(temp, PathBuf::from("out/.summary.parquet.tmp"));
        assert!(temp_path_for(Path::new("/")).is_err());
    }
}
