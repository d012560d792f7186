pub mod types;
pub mod writer;
pub mod service;

pub use service::SeedService;
pub use types::SeedStats;
pub use writer::{CsvConfig, SeedCsvWriter, SEED_COLUMN};
