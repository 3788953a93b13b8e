use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use crate::attributes::AttributeThresholds;
use crate::balance::BalanceRatios;

/// Parse CVAT XML annotations, balance ramp/barrier/negative images and write
/// a YOLO dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct PrepareArgs {
    /// Directory containing all images (searched recursively)
    #[arg(long = "images_dir", default_value = "yolov8/images")]
    pub images_dir: PathBuf,

    /// Glob pattern matching the CVAT XML annotation files
    #[arg(long = "xml_glob", default_value = "yolov8/**/*.xml")]
    pub xml_glob: String,

    /// Directory receiving images, labels, split files and data.yaml
    #[arg(long = "output_dir", default_value = "yolov8")]
    pub output_dir: PathBuf,

    /// Proportion of the balanced dataset to use for validation
    #[arg(long = "val_ratio", default_value_t = 0.2, value_parser = validate_size)]
    pub val_ratio: f64,

    #[command(flatten)]
    pub ratios: RatioArgs,

    /// Drop ramp boxes whose width bucket is below this many centimetres
    #[arg(long = "min_ramp_width")]
    pub min_ramp_width: Option<u32>,

    /// Drop step/stair boxes whose height bucket is below this many centimetres
    #[arg(long = "min_step_height")]
    pub min_step_height: Option<u32>,

    /// Seed for random sampling; omit for a different subset on every run
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

impl PrepareArgs {
    pub fn thresholds(&self) -> AttributeThresholds {
        AttributeThresholds {
            min_ramp_width_cm: self.min_ramp_width,
            min_step_height_cm: self.min_step_height,
        }
    }
}

/// Re-balance existing train/val split lists using the label files on disk.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RebalanceArgs {
    /// Existing training split list
    #[arg(long = "train_split", default_value = "yolov8/train.txt")]
    pub train_split: PathBuf,

    /// Existing validation split list
    #[arg(long = "val_split", default_value = "yolov8/val.txt")]
    pub val_split: PathBuf,

    /// Directory holding one label file per image stem
    #[arg(long = "labels_dir", default_value = "yolov8/labels")]
    pub labels_dir: PathBuf,

    /// Directory receiving the balanced subset
    #[arg(long = "output_dir", default_value = "yolov8/train")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub ratios: RatioArgs,

    /// Seed for random sampling; omit for a different subset on every run
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

/// Target proportions primary : secondary : negative.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RatioArgs {
    /// Primary (ramp) share of the ratio
    #[arg(long = "primary_per_unit", default_value_t = 1.0, value_parser = validate_positive)]
    pub primary_per_unit: f64,

    /// Secondary (barrier) images to keep per primary unit
    #[arg(long = "secondary_per_unit", default_value_t = 1.0, value_parser = validate_ratio)]
    pub secondary_per_unit: f64,

    /// Negative images to keep per primary unit
    #[arg(long = "negative_per_unit", default_value_t = 1.0, value_parser = validate_ratio)]
    pub negative_per_unit: f64,
}

impl From<RatioArgs> for BalanceRatios {
    fn from(args: RatioArgs) -> Self {
        BalanceRatios {
            primary_per_unit: args.primary_per_unit,
            secondary_per_unit: args.secondary_per_unit,
            negative_per_unit: args.negative_per_unit,
        }
    }
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

// Validate a non-negative, finite ratio
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val >= 0.0 => Ok(val),
        _ => Err("RATIO must be a non-negative number".to_string()),
    }
}

pub fn validate_positive(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("RATIO must be greater than 0".to_string()),
    }
}
