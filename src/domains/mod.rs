pub mod export;
pub mod seed;

pub use export::{ExportService, ExportSummary};
pub use seed::{SeedService, SeedStats};
