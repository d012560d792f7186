mod error;

pub use error::{ExportError, SeedError, CONNECTION_HINT};

/// Result type for table export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for seed conversion operations
pub type SeedResult<T> = Result<T, SeedError>;
