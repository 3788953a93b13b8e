use clap::Parser;
use log::{error, info};

use cvat2yolo::{rebalance_dataset, RebalanceArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RebalanceArgs::parse();

    info!("Starting the split rebalancing process...");

    match rebalance_dataset(&args) {
        Ok(report) => info!(
            "Rebalanced {} train and {} val images.",
            report.train.len(),
            report.val.len()
        ),
        Err(e) => {
            error!("Failed to rebalance dataset: {}", e);
            std::process::exit(1);
        }
    }
}
