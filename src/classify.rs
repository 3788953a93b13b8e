use log::warn;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DatasetError;
use crate::io::label_file_name;
use crate::parser::AnnotationIndex;
use crate::types::{AnnotationRecord, Category, ImageRecord, PRIMARY_CLASS_ID, SECONDARY_CLASS_ID};

/// Assign an image to its category. A single primary box makes the image
/// primary regardless of any secondary boxes.
pub fn classify(record: Option<&AnnotationRecord>) -> Category {
    match record {
        Some(record) if !record.is_empty() => classify_classes(record.classes()),
        _ => Category::Negative,
    }
}

/// Category of an image carrying boxes of the given classes.
pub fn classify_classes(classes: &BTreeSet<usize>) -> Category {
    if classes.contains(&PRIMARY_CLASS_ID) {
        Category::Primary
    } else if classes.contains(&SECONDARY_CLASS_ID) {
        Category::Secondary
    } else {
        Category::Negative
    }
}

/// Class ids of a YOLO label file. Only the first token of each line is read,
/// so a truncated line still counts for its class.
pub fn label_classes(text: &str, source: &Path) -> BTreeSet<usize> {
    let mut classes = BTreeSet::new();
    for (line_num, line) in text.lines().enumerate() {
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        match token.parse::<usize>() {
            Ok(class_id) => {
                classes.insert(class_id);
            }
            Err(_) => warn!(
                "{}:{}: bad class id '{}'",
                source.display(),
                line_num + 1,
                token
            ),
        }
    }
    classes
}

/// Items grouped by category, each group in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySets<T> {
    pub primary: Vec<T>,
    pub secondary: Vec<T>,
    pub negative: Vec<T>,
}

impl<T> Default for CategorySets<T> {
    fn default() -> Self {
        Self {
            primary: Vec::new(),
            secondary: Vec::new(),
            negative: Vec::new(),
        }
    }
}

impl<T> CategorySets<T> {
    pub fn push(&mut self, category: Category, item: T) {
        self.get_mut(category).push(item);
    }

    pub fn get(&self, category: Category) -> &[T] {
        match category {
            Category::Primary => &self.primary,
            Category::Secondary => &self.secondary,
            Category::Negative => &self.negative,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<T> {
        match category {
            Category::Primary => &mut self.primary,
            Category::Secondary => &mut self.secondary,
            Category::Negative => &mut self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.primary.len() + self.secondary.len() + self.negative.len()
    }
}

/// Classify every image of the inventory. Images without a record are negative.
pub fn classify_inventory(
    images: &[ImageRecord],
    annotations: &AnnotationIndex,
) -> CategorySets<ImageRecord> {
    let mut sets = CategorySets::default();
    for image in images {
        sets.push(classify(annotations.get(image)), image.clone());
    }
    sets
}

/// Classify an image from its YOLO label file. A missing or empty file is negative.
pub fn classify_label_file(label_path: &Path) -> Result<Category, DatasetError> {
    if !label_path.exists() {
        return Ok(Category::Negative);
    }
    let text = fs::read_to_string(label_path).map_err(DatasetError::io(label_path))?;
    Ok(classify_classes(&label_classes(&text, label_path)))
}

/// Classify listed images by the label file `<labels_dir>/<stem>.txt` of each.
pub fn classify_by_label_files(
    images: Vec<PathBuf>,
    labels_dir: &Path,
) -> Result<CategorySets<PathBuf>, DatasetError> {
    let mut sets = CategorySets::default();
    for image in images {
        let category = classify_label_file(&labels_dir.join(label_file_name(&image)))?;
        sets.push(category, image);
    }
    Ok(sets)
}
