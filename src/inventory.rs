use jwalk::WalkDir;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::DatasetError;
use crate::types::ImageRecord;

/// Every recognised image below the image directory, with a by-name index.
#[derive(Debug, Clone, Default)]
pub struct ImageInventory {
    records: Vec<ImageRecord>,
    by_name: HashMap<String, usize>,
    by_folded_name: HashMap<String, usize>,
    excluded: usize,
}

impl ImageInventory {
    /// Recursively scan `images_dir` for files with a supported image extension.
    pub fn scan(images_dir: &Path) -> Result<Self, DatasetError> {
        if !images_dir.is_dir() {
            return Err(DatasetError::MissingImageDir(images_dir.to_path_buf()));
        }
        let root = fs::canonicalize(images_dir).map_err(DatasetError::io(images_dir))?;

        let records = WalkDir::new(&root)
            .skip_hidden(false)
            .sort(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| ImageRecord::new(e.path()))
            .collect();

        Ok(Self::from_records(records))
    }

    /// Build an inventory from already-resolved records.
    ///
    /// Images are copied into one flat output directory and labelled by stem,
    /// so two images sharing a file name or a stem would collide there. The
    /// first in path order is kept and the others are excluded.
    pub fn from_records(mut records: Vec<ImageRecord>) -> Self {
        records.sort();
        records.dedup();

        let mut kept: Vec<ImageRecord> = Vec::with_capacity(records.len());
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut by_stem: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut by_folded_name: HashMap<String, usize> = HashMap::with_capacity(records.len());
        let mut excluded = 0;
        for record in records {
            let name = record.file_name().to_string();
            let stem = record.stem().to_string();
            if let Some(&first) = by_name.get(&name).or_else(|| by_stem.get(&stem)) {
                warn!(
                    "Image {} collides with {} in the output layout, excluding it",
                    record.path().display(),
                    kept[first].path().display()
                );
                excluded += 1;
                continue;
            }
            let index = kept.len();
            by_folded_name.entry(name.to_lowercase()).or_insert(index);
            by_stem.insert(stem, index);
            by_name.insert(name, index);
            kept.push(record);
        }

        Self {
            records: kept,
            by_name,
            by_folded_name,
            excluded,
        }
    }

    /// Resolve an annotation's image reference by base name (either path
    /// separator is accepted in the reference). Falls back to a
    /// case-insensitive match when there is no exact match.
    pub fn resolve(&self, reference: &str) -> Option<&ImageRecord> {
        let name = reference
            .trim()
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .filter(|name| !name.is_empty())?;
        if let Some(&index) = self.by_name.get(name) {
            return Some(&self.records[index]);
        }
        let index = *self.by_folded_name.get(&name.to_lowercase())?;
        debug!(
            "Resolved '{}' to {} by case-insensitive name",
            reference,
            self.records[index].path().display()
        );
        Some(&self.records[index])
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Images left out because their output name or stem was already taken.
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
