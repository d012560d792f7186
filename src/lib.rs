// Public modules
pub mod config;
pub mod domains;
pub mod errors;

pub use config::{DatabaseConfig, ExportConfig, SeedConfig};
pub use errors::{ExportError, SeedError};

/// Initialize logging for the command line tools.
///
/// `RUST_LOG` wins when set; otherwise debug builds log at `debug` and release builds at `info`.
pub fn init_logging() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);

    // Ignore a second initialization, e.g. when several tests call this
    let _ = env_logger::Builder::from_env(env).try_init();
}
