use crate::config::DatabaseConfig;
use crate::domains::export::schemas::RecordBatchBuilder;
use crate::errors::{ExportError, ExportResult};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor, Statement};

/// Where the exported rows come from
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Run the export query and return the whole result set as one batch
    async fn fetch_table(&self) -> ExportResult<RecordBatch>;

    /// Human readable description for log lines
    fn describe(&self) -> String;
}

/// Reads a table from PostgreSQL over a single short-lived connection
pub struct PostgresTableSource {
    config: DatabaseConfig,
    query: String,
}

impl std::fmt::Debug for PostgresTableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTableSource")
            .field("config", &self.config)
            .field("query", &self.query)
            .finish()
    }
}

impl PostgresTableSource {
    pub fn new(config: DatabaseConfig, query: impl Into<String>) -> Self {
        Self {
            config,
            query: query.into(),
        }
    }

    async fn read_all(&self, conn: &mut PgConnection) -> ExportResult<RecordBatch> {
        let statement = (&mut *conn)
            .prepare(self.query.as_str())
            .await
            .map_err(ExportError::from_query)?;

        let mut builder = RecordBatchBuilder::for_pg_columns(statement.columns())?;

        let mut rows = statement.query().fetch(&mut *conn);
        while let Some(row) = rows.try_next().await.map_err(ExportError::from_query)? {
            builder.append_row(&row)?;
        }
        drop(rows);

        log::debug!("Fetched {} rows", builder.num_rows());
        builder.finish()
    }
}

#[async_trait]
impl TableSource for PostgresTableSource {
    async fn fetch_table(&self) -> ExportResult<RecordBatch> {
        log::info!(
            "Connecting to PostgreSQL at {}:{} (database '{}')",
            self.config.host,
            self.config.port,
            self.config.database
        );
        let mut conn = PgConnection::connect_with(&self.config.connect_options())
            .await
            .map_err(ExportError::from_connect)?;

        log::info!("Running query: {}", self.query);
        let result = self.read_all(&mut conn).await;

        // Close on every path, the query result decides the outcome
        if let Err(e) = conn.close().await {
            log::warn!("Failed to close PostgreSQL connection cleanly: {}", e);
        }

        result
    }

    fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.config.user, self.config.host, self.config.port, self.config.database
        )
    }
}
