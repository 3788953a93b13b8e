use log::{info, warn};
use std::path::PathBuf;

use crate::balance::{balance, rng_from_seed, split_selection, BalanceRatios, BalanceStats};
use crate::classify::{classify_by_label_files, classify_inventory};
use crate::config::{PrepareArgs, RebalanceArgs};
use crate::error::DatasetError;
use crate::inventory::ImageInventory;
use crate::io::{
    exclude_output_collisions, label_file_name, materialize_split, read_split_list,
    setup_output_directories, write_dataset_files, DatasetFiles, LabelSource, BALANCED_FILE_NAMES,
    PREPARED_FILE_NAMES,
};
use crate::parser::parse_documents;
use crate::types::{ImageRecord, ProcessingStats};
use crate::utils::glob_files;

/// Outcome of [`process_dataset`].
#[derive(Debug, Clone)]
pub struct PrepareReport {
    pub processing: ProcessingStats,
    pub balance: BalanceStats,
    /// Absolute paths of the copied images, in split order.
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
    pub files: DatasetFiles,
}

/// Main dataset processing pipeline: parse, classify, balance, split and write.
pub fn process_dataset(args: &PrepareArgs) -> Result<PrepareReport, DatasetError> {
    let inventory = ImageInventory::scan(&args.images_dir)?;
    info!(
        "Found {} images in {}",
        inventory.len(),
        args.images_dir.display()
    );
    if inventory.excluded() > 0 {
        warn!(
            "Excluded {} images whose output name was already taken",
            inventory.excluded()
        );
    }

    let documents = glob_files(&args.xml_glob)?;
    info!("Found {} annotation documents.", documents.len());

    let (annotations, processing) =
        parse_documents(&documents, &inventory, &args.thresholds());
    processing.print_summary();

    let sets = classify_inventory(inventory.records(), &annotations);
    info!("Found {} images with ramps.", sets.primary.len());
    info!("Found {} images with only barriers.", sets.secondary.len());
    info!("Found {} negative images.", sets.negative.len());

    let mut rng = rng_from_seed(args.seed);
    let balanced = balance(sets, &BalanceRatios::from(args.ratios), &mut rng)?;
    balanced.stats.print_summary("dataset");

    let split = split_selection(balanced.selected, args.val_ratio);
    let output_dirs = setup_output_directories(&args.output_dir)?;
    let label_for = |image: &ImageRecord| {
        LabelSource::Text(
            annotations
                .get(image)
                .map(|record| record.to_label_text())
                .unwrap_or_default(),
        )
    };
    let train = materialize_split(&split.train, "Train", &output_dirs, label_for)?;
    let val = materialize_split(&split.val, "Val", &output_dirs, label_for)?;

    let files = write_dataset_files(&output_dirs, &PREPARED_FILE_NAMES, &train, &val)?;
    info!("Balanced dataset creation complete.");

    Ok(PrepareReport {
        processing,
        balance: balanced.stats,
        train,
        val,
        files,
    })
}

/// Outcome of [`rebalance_dataset`].
#[derive(Debug, Clone)]
pub struct RebalanceReport {
    pub train_stats: BalanceStats,
    pub val_stats: BalanceStats,
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
    pub files: DatasetFiles,
}

/// Balance each existing split independently and copy the subsets into one
/// shared layout. Both splits are balanced before anything is written.
pub fn rebalance_dataset(args: &RebalanceArgs) -> Result<RebalanceReport, DatasetError> {
    let ratios = BalanceRatios::from(args.ratios);
    let mut rng = rng_from_seed(args.seed);

    let (train_list, val_list) = exclude_output_collisions(
        read_split_list(&args.train_split)?,
        read_split_list(&args.val_split)?,
    );
    let train_sets = classify_by_label_files(train_list, &args.labels_dir)?;
    let val_sets = classify_by_label_files(val_list, &args.labels_dir)?;

    let train_balanced = balance(train_sets, &ratios, &mut rng)?;
    let val_balanced = balance(val_sets, &ratios, &mut rng)?;
    train_balanced.stats.print_summary("train");
    val_balanced.stats.print_summary("val");

    let output_dirs = setup_output_directories(&args.output_dir)?;
    let label_for = |image: &PathBuf| LabelSource::File(args.labels_dir.join(label_file_name(image)));
    let train = materialize_split(&train_balanced.selected, "Train", &output_dirs, label_for)?;
    let val = materialize_split(&val_balanced.selected, "Val", &output_dirs, label_for)?;

    let files = write_dataset_files(&output_dirs, &BALANCED_FILE_NAMES, &train, &val)?;
    info!(
        "Subset images: {}, labels: {}",
        output_dirs.images_dir.display(),
        output_dirs.labels_dir.display()
    );

    Ok(RebalanceReport {
        train_stats: train_balanced.stats,
        val_stats: val_balanced.stats,
        train,
        val,
        files,
    })
}
