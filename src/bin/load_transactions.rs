use std::process;
use transactions_pipeline::domains::seed::SeedService;
use transactions_pipeline::{init_logging, SeedConfig, SeedError};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let service = SeedService::new(SeedConfig::from_env());

    match service.convert().await {
        Ok(stats) => println!("CSV generated: {} records", stats.records_written),
        Err(err) => {
            eprintln!("Error: {}", err);
            if let SeedError::InputNotFound(_) = err {
                eprintln!("Place the JSON Lines file there or point SEED_INPUT_PATH at it");
            }
            process::exit(1);
        }
    }
}
