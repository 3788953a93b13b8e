//! Output layout: copied images, label files, split lists and the descriptor.
//!
//! Image copies are skipped when the destination already exists, while split
//! lists and the descriptor are rewritten on every run.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DatasetError;
use crate::types::{
    OutputDirs, LABEL_EXTENSION, PRIMARY_CLASS_ID, PRIMARY_CLASS_NAME, SECONDARY_CLASS_ID,
    SECONDARY_CLASS_NAME,
};
use crate::utils::{absolute_path, create_progress_bar, ensure_directory};

/// File names of the split lists and descriptor inside the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetFileNames {
    pub train_list: &'static str,
    pub val_list: &'static str,
    pub descriptor: &'static str,
}

pub const PREPARED_FILE_NAMES: DatasetFileNames = DatasetFileNames {
    train_list: "train.txt",
    val_list: "val.txt",
    descriptor: "data.yaml",
};

pub const BALANCED_FILE_NAMES: DatasetFileNames = DatasetFileNames {
    train_list: "train_balanced.txt",
    val_list: "val_balanced.txt",
    descriptor: "data_balanced.yaml",
};

/// Descriptor consumed by the training component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub names: BTreeMap<usize, String>,
    pub train: PathBuf,
    pub val: PathBuf,
}

impl DatasetDescriptor {
    pub fn new(train: PathBuf, val: PathBuf) -> Self {
        let names = BTreeMap::from([
            (PRIMARY_CLASS_ID, PRIMARY_CLASS_NAME.to_string()),
            (SECONDARY_CLASS_ID, SECONDARY_CLASS_NAME.to_string()),
        ]);
        Self { names, train, val }
    }
}

/// Where the label of a selected image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// Label file contents; written over any existing label.
    Text(String),
    /// An existing label file to copy. When it does not exist an empty label
    /// is created, but only if none is present yet.
    File(PathBuf),
}

/// Set up the unified output layout under `root`
pub fn setup_output_directories(root: &Path) -> Result<OutputDirs, DatasetError> {
    let root = ensure_directory(root)?;
    let images_dir = ensure_directory(&root.join("images"))?;
    let labels_dir = ensure_directory(&root.join("labels"))?;
    Ok(OutputDirs {
        root,
        images_dir,
        labels_dir,
    })
}

/// Label file name for an image: its stem with the label extension.
pub fn label_file_name(image: &Path) -> PathBuf {
    let stem = image.file_stem().unwrap_or_default();
    PathBuf::from(stem).with_extension(LABEL_EXTENSION)
}

/// Drop listed images that would land on an output image or label already
/// claimed by an earlier entry of either list. Train entries take precedence.
pub fn exclude_output_collisions(
    train: Vec<PathBuf>,
    val: Vec<PathBuf>,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut names = HashSet::new();
    let mut stems = HashSet::new();
    let mut claim = |path: &PathBuf| {
        let name = path.file_name().map(OsStr::to_os_string);
        let stem = path.file_stem().map(OsStr::to_os_string);
        if names.contains(&name) || stems.contains(&stem) {
            warn!(
                "{} collides with an earlier listed image, excluding it",
                path.display()
            );
            return false;
        }
        names.insert(name);
        stems.insert(stem);
        true
    };
    let train: Vec<PathBuf> = train.into_iter().filter(|path| claim(path)).collect();
    let val: Vec<PathBuf> = val.into_iter().filter(|path| claim(path)).collect();
    (train, val)
}

/// Copy one image and its label into the layout. Returns the absolute path of
/// the image inside the layout.
pub fn materialize_sample(
    image: &Path,
    label: &LabelSource,
    output_dirs: &OutputDirs,
) -> Result<PathBuf, DatasetError> {
    let file_name = image.file_name().ok_or_else(|| DatasetError::Io {
        path: image.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "image path has no file name"),
    })?;
    let image_output_path = output_dirs.images_dir.join(file_name);
    if !image_output_path.exists() {
        fs::copy(image, &image_output_path).map_err(DatasetError::io(image))?;
    }

    let label_output_path = output_dirs.labels_dir.join(label_file_name(image));
    match label {
        LabelSource::Text(text) => {
            fs::write(&label_output_path, text).map_err(DatasetError::io(&label_output_path))?;
        }
        LabelSource::File(source) if source.exists() => {
            fs::copy(source, &label_output_path).map_err(DatasetError::io(source))?;
        }
        LabelSource::File(_) => {
            if !label_output_path.exists() {
                File::create(&label_output_path)
                    .map_err(DatasetError::io(&label_output_path))?;
            }
        }
    }

    absolute_path(&image_output_path)
}

/// Materialize every sample of one split, returning their paths in order.
pub fn materialize_split<T, F>(
    samples: &[T],
    split_name: &str,
    output_dirs: &OutputDirs,
    mut label_for: F,
) -> Result<Vec<PathBuf>, DatasetError>
where
    T: AsRef<Path>,
    F: FnMut(&T) -> LabelSource,
{
    let pb = create_progress_bar(samples.len() as u64, split_name);
    let mut written = Vec::with_capacity(samples.len());
    for sample in samples {
        let label = label_for(sample);
        written.push(materialize_sample(sample.as_ref(), &label, output_dirs)?);
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} copying complete", split_name));
    Ok(written)
}

/// Write a split list: one path per line, no header. Overwrites.
pub fn write_split_list(path: &Path, images: &[PathBuf]) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(DatasetError::io(path))?;
    let mut writer = BufWriter::new(file);
    for image in images {
        writeln!(writer, "{}", image.display()).map_err(DatasetError::io(path))?;
    }
    writer.flush().map_err(DatasetError::io(path))
}

/// Read a split list written by [`write_split_list`]. Blank lines are ignored.
pub fn read_split_list(path: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let content = fs::read_to_string(path).map_err(DatasetError::io(path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Create the descriptor file for YOLO training
pub fn write_descriptor(path: &Path, descriptor: &DatasetDescriptor) -> Result<(), DatasetError> {
    let yaml = serde_yaml::to_string(descriptor)?;
    fs::write(path, yaml).map_err(DatasetError::io(path))
}

/// Paths of the files written by [`write_dataset_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub train_list: PathBuf,
    pub val_list: PathBuf,
    pub descriptor: PathBuf,
}

/// Write both split lists and the descriptor pointing at them.
pub fn write_dataset_files(
    output_dirs: &OutputDirs,
    names: &DatasetFileNames,
    train: &[PathBuf],
    val: &[PathBuf],
) -> Result<DatasetFiles, DatasetError> {
    if val.is_empty() {
        warn!("Validation split is empty");
    }
    let train_list = output_dirs.root.join(names.train_list);
    let val_list = output_dirs.root.join(names.val_list);
    write_split_list(&train_list, train)?;
    write_split_list(&val_list, val)?;

    let train_list = absolute_path(&train_list)?;
    let val_list = absolute_path(&val_list)?;
    let descriptor = output_dirs.root.join(names.descriptor);
    write_descriptor(
        &descriptor,
        &DatasetDescriptor::new(train_list.clone(), val_list.clone()),
    )?;
    let descriptor = absolute_path(&descriptor)?;

    info!("Train split file: {} ({} images)", train_list.display(), train.len());
    info!("Validation split file: {} ({} images)", val_list.display(), val.len());
    info!("Descriptor: {}", descriptor.display());

    Ok(DatasetFiles {
        train_list,
        val_list,
        descriptor,
    })
}
