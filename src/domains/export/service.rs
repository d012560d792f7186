use crate::config::ExportConfig;
use crate::domains::export::repository::{PostgresTableSource, TableSource};
use crate::domains::export::types::{ExportReport, ExportStage, ExportSummary};
use crate::domains::export::writers::ParquetFileWriter;
use crate::errors::ExportResult;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Exports one table to a Parquet file: fetch, write, summarize
pub struct ExportService {
    source: Arc<dyn TableSource>,
    writer: ParquetFileWriter,
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("source", &self.source.describe())
            .field("writer", &self.writer)
            .finish()
    }
}

impl ExportService {
    pub fn new(source: Arc<dyn TableSource>, writer: ParquetFileWriter) -> Self {
        Self { source, writer }
    }

    /// Service reading the fixed summary query from the configured database
    pub fn from_config(config: &ExportConfig) -> Self {
        let source = PostgresTableSource::new(config.database.clone(), config.query());
        Self::new(Arc::new(source), ParquetFileWriter::new())
    }

    pub async fn export(&self, output_path: &Path) -> ExportResult<ExportReport> {
        self.export_with_progress(output_path, |_| {}).await
    }

    /// Same as [`export`](Self::export), calling `on_stage` as each stage begins
    pub async fn export_with_progress<F>(
        &self,
        output_path: &Path,
        mut on_stage: F,
    ) -> ExportResult<ExportReport>
    where
        F: FnMut(ExportStage),
    {
        let start_time = Instant::now();

        log::info!("Reading table from {}", self.source.describe());
        on_stage(ExportStage::Reading);
        let batch = self.source.fetch_table().await?;

        // Validate the summary columns before touching the filesystem
        let summary = ExportSummary::from_batch(&batch)?;

        log::info!("Writing {} rows to {}", batch.num_rows(), output_path.display());
        on_stage(ExportStage::Writing {
            rows: batch.num_rows(),
        });
        let stats = self.writer.write_batch(output_path, &batch).await?;

        let report = ExportReport {
            output_path: output_path.to_path_buf(),
            bytes_written: stats.bytes_written,
            duration_ms: start_time.elapsed().as_millis() as u64,
            summary,
        };
        log::info!(
            "Parquet export completed: {} rows, {} bytes",
            report.summary.rows,
            report.bytes_written
        );

        Ok(report)
    }
}
