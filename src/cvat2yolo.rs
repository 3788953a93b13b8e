use clap::Parser;
use log::{error, info};

use cvat2yolo::{process_dataset, PrepareArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = PrepareArgs::parse();

    info!("Starting the dataset preparation process...");

    if let Err(e) = process_dataset(&args) {
        error!("Failed to prepare dataset: {}", e);
        std::process::exit(1);
    }
}
