use sqlx::postgres::PgConnectOptions;
use std::env;
use std::path::{Path, PathBuf};

/// Default Parquet destination when no path is given on the command line
pub const DEFAULT_EXPORT_PATH: &str = "transactions_summary.parquet";

pub const SOURCE_TABLE: &str = "transactions_summary";
pub const SORT_COLUMNS: [&str; 2] = ["bin", "day"];

/// Columns summed in the export report
pub const APPROVED_COUNT_COLUMN: &str = "number_of_approved_transactions";
pub const APPROVED_AMOUNT_COLUMN: &str = "total_approved_amount";

pub const SEED_INPUT_FILE: &str = "transactions_50k.jsonl";
pub const SEED_OUTPUT_FILE: &str = "dbt_transactions/seeds/raw_transactions.csv";

/// PostgreSQL connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5433,
            user: "transactions_user".to_string(),
            password: "transactions_pass".to_string(),
            database: "transactions_db".to_string(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseConfig {
    /// Read `TRANSACTIONS_DB_*` variables, falling back to the local docker-compose defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("TRANSACTIONS_DB_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    log::warn!("Ignoring invalid TRANSACTIONS_DB_PORT '{}', using {}", raw, defaults.port);
                    defaults.port
                }
            },
            None => defaults.port,
        };

        Self {
            host: lookup("TRANSACTIONS_DB_HOST").unwrap_or(defaults.host),
            port,
            user: lookup("TRANSACTIONS_DB_USER").unwrap_or(defaults.user),
            password: lookup("TRANSACTIONS_DB_PASSWORD").unwrap_or(defaults.password),
            database: lookup("TRANSACTIONS_DB_NAME").unwrap_or(defaults.database),
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Everything the table exporter needs for one run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub database: DatabaseConfig,
    pub output_path: PathBuf,
}

impl ExportConfig {
    pub fn from_env(output_path: Option<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig::from_env(),
            output_path: output_path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH)),
        }
    }

    /// The fixed export query
    pub fn query(&self) -> String {
        format!(
            "SELECT * FROM {} ORDER BY {}",
            SOURCE_TABLE,
            SORT_COLUMNS.join(", ")
        )
    }
}

/// Input and output locations for the seed converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl SeedConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }

    /// Paths relative to the base directory, which is the crate directory unless
    /// `TRANSACTIONS_BASE_DIR` says otherwise. `SEED_INPUT_PATH` and `SEED_OUTPUT_PATH`
    /// replace either path outright.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = lookup("TRANSACTIONS_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")));
        let defaults = Self::in_dir(&base_dir);

        Self {
            input_path: lookup("SEED_INPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_path),
            output_path: lookup("SEED_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
        }
    }

    /// Default file names resolved against `base_dir`
    pub fn in_dir(base_dir: &Path) -> Self {
        Self::new(base_dir.join(SEED_INPUT_FILE), base_dir.join(SEED_OUTPUT_FILE))
    }
}
