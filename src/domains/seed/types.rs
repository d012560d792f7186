use serde::Serialize;

/// Counters for one seed conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedStats {
    pub records_written: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
}
