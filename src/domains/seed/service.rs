use crate::config::SeedConfig;
use crate::domains::seed::types::SeedStats;
use crate::domains::seed::writer::{CsvConfig, SeedCsvWriter};
use crate::errors::{SeedError, SeedResult};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, BufWriter};

/// Converts a JSON Lines file into the dbt seed CSV
#[derive(Debug, Clone)]
pub struct SeedService {
    config: SeedConfig,
    csv_config: CsvConfig,
}

impl SeedService {
    pub fn new(config: SeedConfig) -> Self {
        Self {
            config,
            csv_config: CsvConfig::default(),
        }
    }

    pub fn with_csv_config(mut self, csv_config: CsvConfig) -> Self {
        self.csv_config = csv_config;
        self
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub async fn convert(&self) -> SeedResult<SeedStats> {
        let input_path = &self.config.input_path;
        let output_path = &self.config.output_path;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        log::info!("Reading {}", input_path.display());
        let input = File::open(input_path)
            .await
            .map_err(|e| SeedError::from_open(e, input_path.clone()))?;
        let output = File::create(output_path).await?;

        let mut writer = SeedCsvWriter::new(BufWriter::new(output), self.csv_config.clone());
        writer.write_header().await?;

        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            writer.write_record(&line).await?;
        }

        let stats = writer.finish().await?;
        log::info!(
            "Seed written to {}: {} records, {} bytes in {} ms",
            output_path.display(),
            stats.records_written,
            stats.bytes_written,
            stats.duration_ms
        );

        Ok(stats)
    }
}
