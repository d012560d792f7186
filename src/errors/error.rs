use std::path::PathBuf;
use thiserror::Error;

/// Hint printed alongside connectivity failures
pub const CONNECTION_HINT: &str = "Make sure PostgreSQL is running: docker-compose up -d";

/// Table export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Error connecting to PostgreSQL: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unsupported type {type_name} for column '{column}'")]
    UnsupportedColumnType {
        column: String,
        type_name: String,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ExportError {
    /// Classify an error raised while opening the connection.
    ///
    /// Anything that goes wrong before the session is established (refused socket,
    /// DNS, TLS, authentication, unknown database) counts as a connectivity failure.
    pub fn from_connect(err: sqlx::Error) -> Self {
        ExportError::Connection(err.to_string())
    }

    /// Classify an error raised while running the query on an open connection.
    pub fn from_query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => ExportError::Connection(err.to_string()),
            other => ExportError::Query(other.to_string()),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ExportError::Connection(_))
    }

    /// Remediation hint for the operator, if this kind of failure has one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ExportError::Connection(_) => Some(CONNECTION_HINT),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for ExportError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ExportError::Schema(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for ExportError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

/// Seed conversion errors
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl SeedError {
    /// Map an error from opening the input file, singling out a missing file
    pub fn from_open(err: std::io::Error, path: PathBuf) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SeedError::InputNotFound(path),
            _ => SeedError::Io(err),
        }
    }
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        SeedError::Csv(err.to_string())
    }
}
