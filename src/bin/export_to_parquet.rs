use std::env;
use std::path::PathBuf;
use std::process;
use transactions_pipeline::config::SOURCE_TABLE;
use transactions_pipeline::domains::export::{ExportService, ExportStage};
use transactions_pipeline::{init_logging, ExportConfig};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let output_path = env::args().nth(1).map(PathBuf::from);
    let config = ExportConfig::from_env(output_path);

    println!("Connecting to PostgreSQL...");
    let service = ExportService::from_config(&config);

    let destination = &config.output_path;
    let progress = |stage: ExportStage| match stage {
        ExportStage::Reading => println!("Reading table {}...", SOURCE_TABLE),
        ExportStage::Writing { .. } => println!("Writing to {}...", destination.display()),
    };

    match service.export_with_progress(destination, progress).await {
        Ok(report) => {
            println!();
            for line in report.lines() {
                println!("{}", line);
            }
        }
        Err(err) if err.is_connection() => {
            eprintln!("{}", err);
            if let Some(hint) = err.hint() {
                eprintln!("{}", hint);
            }
            process::exit(1);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}
