use crate::domains::seed::types::SeedStats;
use crate::errors::SeedResult;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Name of the single column in the seed file
pub const SEED_COLUMN: &str = "transaction";

#[derive(Debug, Clone)]
pub struct CsvConfig {
    pub delimiter: u8,
    pub quote_char: u8,
    pub batch_size: usize,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_char: b'"',
            batch_size: 1000,
        }
    }
}

/// Writes one-column seed CSV rows to an async sink, buffering `batch_size` rows at a time
pub struct SeedCsvWriter<W: AsyncWrite + Unpin + Send> {
    inner: W,
    config: CsvConfig,
    buffer: Vec<u8>,
    pending: usize,
    header_written: bool,
    stats: SeedStats,
    start_time: Instant,
}

impl<W: AsyncWrite + Unpin + Send> SeedCsvWriter<W> {
    pub fn new(writer: W, config: CsvConfig) -> Self {
        Self {
            inner: writer,
            config,
            buffer: Vec::new(),
            pending: 0,
            header_written: false,
            stats: SeedStats::default(),
            start_time: Instant::now(),
        }
    }

    pub async fn write_header(&mut self) -> SeedResult<()> {
        if self.header_written {
            return Ok(());
        }
        self.encode(SEED_COLUMN)?;
        self.header_written = true;
        self.flush_buffer().await
    }

    /// Append one input line as a row; surrounding whitespace is dropped, the rest is kept verbatim
    pub async fn write_record(&mut self, line: &str) -> SeedResult<()> {
        if !self.header_written {
            self.write_header().await?;
        }

        self.encode(line.trim())?;
        self.pending += 1;
        self.stats.records_written += 1;

        if self.pending >= self.config.batch_size {
            self.flush_buffer().await?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    /// Flush everything and hand back the final counts
    pub async fn finish(mut self) -> SeedResult<SeedStats> {
        if !self.header_written {
            self.write_header().await?;
        }
        self.flush_buffer().await?;
        self.inner.flush().await?;
        self.inner.shutdown().await?;

        self.stats.duration_ms = self.start_time.elapsed().as_millis() as u64;
        Ok(self.stats)
    }

    fn encode(&mut self, field: &str) -> SeedResult<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quote_char)
            .terminator(csv::Terminator::CRLF)
            .from_writer(&mut self.buffer);
        wtr.write_record([field])?;
        wtr.flush()?;
        Ok(())
    }

    async fn flush_buffer(&mut self) -> SeedResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.inner.write_all(&self.buffer).await?;
        self.stats.bytes_written += self.buffer.len();
        self.buffer.clear();
        self.pending = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(lines: &[&str], config: CsvConfig) -> (String, SeedStats) {
        let mut out = Vec::new();
        let mut writer = SeedCsvWriter::new(&mut out, config);
        writer.write_header().await.unwrap();
        for line in lines {
            writer.write_record(line).await.unwrap();
        }
        let stats = writer.finish().await.unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[tokio::test]
    async fn test_json_lines_are_quoted_minimally() {
        let (csv, stats) = render(
            &[r#"{"id":1,"amount":250}"#, "plain"],
            CsvConfig::default(),
        )
        .await;
        assert_eq!(
            csv,
            "transaction\r\n\"{\"\"id\"\":1,\"\"amount\"\":250}\"\r\nplain\r\n"
        );
        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.bytes_written, csv.len());
    }

    #[tokio::test]
    async fn test_surrounding_whitespace_is_stripped() {
        let (csv, _) = render(&["   {\"a\":\"b c\"}\t\r\n"], CsvConfig::default()).await;
        assert_eq!(csv, "transaction\r\n\"{\"\"a\"\":\"\"b c\"\"}\"\r\n");
    }

    #[tokio::test]
    async fn test_header_written_once_without_records() {
        let mut out = Vec::new();
        let mut writer = SeedCsvWriter::new(&mut out, CsvConfig::default());
        writer.write_header().await.unwrap();
        writer.write_header().await.unwrap();
        let stats = writer.finish().await.unwrap();
        assert_eq!(stats.records_written, 0);
        assert_eq!(out, b"transaction\r\n");
    }

    #[tokio::test]
    async fn test_small_batches_produce_identical_output() {
        let lines: Vec<String> = (0..25).map(|i| format!("{{\"id\":{}}}", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let (batched, _) = render(&refs, CsvConfig { batch_size: 4, ..CsvConfig::default() }).await;
        let (single, stats) = render(&refs, CsvConfig::default()).await;
        assert_eq!(batched, single);
        assert_eq!(stats.records_written, 25);
        assert_eq!(single.lines().count(), 26);
    }
}
