//! CVAT to balanced YOLO dataset converter
//!
//! This library parses CVAT XML box annotations, classifies every image of an
//! inventory as ramp, barrier-only or negative, samples a class-balanced subset
//! and writes it in the YOLO dataset layout.

pub mod attributes;
pub mod balance;
pub mod classify;
pub mod config;
pub mod cvat;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod inventory;
pub mod io;
pub mod parser;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use attributes::{AttributeThresholds, AttributeVerdict};
pub use balance::{balance, rng_from_seed, split_selection, BalanceRatios, BalanceStats};
pub use classify::{classify, CategorySets};
pub use config::{PrepareArgs, RatioArgs, RebalanceArgs};
pub use dataset::{process_dataset, rebalance_dataset};
pub use error::DatasetError;
pub use inventory::ImageInventory;
pub use parser::{parse_documents, AnnotationIndex};
pub use types::{AnnotationRecord, Category, ImageRecord, NormalizedBox};
