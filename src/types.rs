use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &["bmp", "jpeg", "jpg", "png", "webp"];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Class index of the primary class.
pub const PRIMARY_CLASS_ID: usize = 0;
/// Class index of the secondary class.
pub const SECONDARY_CLASS_ID: usize = 1;

/// Class names written to the dataset descriptor, indexed by class id.
pub const PRIMARY_CLASS_NAME: &str = "ramp";
pub const SECONDARY_CLASS_NAME: &str = "barrier";

/// Annotation label that maps to the primary class.
pub const PRIMARY_LABEL: &str = "ramp";
/// Annotation labels that map to the secondary class.
pub const SECONDARY_LABELS: &[&str] = &["step", "stair"];

/// Extension of YOLO label files.
pub const LABEL_EXTENSION: &str = "txt";

/// An image discovered by the inventory scan. Identity is the absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRecord {
    path: PathBuf,
    extension: String,
}

impl ImageRecord {
    /// Returns `None` when the path has no extension from [`IMG_FORMATS`].
    pub fn new(path: PathBuf) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        if !get_image_extensions_set().contains(&extension) {
            return None;
        }
        Some(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// File stem used to name the label file.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

impl AsRef<Path> for ImageRecord {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// A box as read from an annotation document, in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBox {
    pub label: String,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub attributes: HashMap<String, String>,
}

/// A box in YOLO form: center and size as fractions of the image size.
///
/// All four geometry values are strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Boxes collected for one image across every annotation document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationRecord {
    boxes: Vec<NormalizedBox>,
    classes: BTreeSet<usize>,
}

impl AnnotationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bbox: NormalizedBox) {
        self.classes.insert(bbox.class_id);
        self.boxes.push(bbox);
    }

    /// Union another record into this one. Boxes are appended, never
    /// deduplicated, so merging the same record twice doubles its boxes.
    pub fn merge(&mut self, other: AnnotationRecord) {
        self.boxes.extend(other.boxes);
        self.classes.extend(other.classes);
    }

    pub fn boxes(&self) -> &[NormalizedBox] {
        &self.boxes
    }

    pub fn classes(&self) -> &BTreeSet<usize> {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Contents of the YOLO label file for this record.
    pub fn to_label_text(&self) -> String {
        let mut text = String::with_capacity(self.boxes.len() * 48);
        for bbox in &self.boxes {
            text.push_str(&bbox.to_string());
            text.push('\n');
        }
        text
    }
}

/// The three mutually exclusive image categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Primary,
    Secondary,
    Negative,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Primary => "primary",
            Category::Secondary => "secondary",
            Category::Negative => "negative",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Struct to hold the paths of the unified output layout
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
}

// Struct to hold annotation ingestion statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub documents_parsed: usize,
    pub documents_failed: usize,
    pub images_matched: usize,
    pub images_unmatched: usize,
    pub images_invalid: usize,
    pub boxes_accepted: usize,
    pub boxes_ignored_label: usize,
    pub boxes_rejected_attribute: usize,
    pub boxes_rejected_geometry: usize,
    pub boxes_unparseable: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_summary(&self) {
        log::info!("=== Annotation Summary ===");
        log::info!(
            "Documents parsed: {} (failed: {})",
            self.documents_parsed,
            self.documents_failed
        );
        log::info!("Image entries matched: {}", self.images_matched);
        log::info!("Boxes accepted: {}", self.boxes_accepted);
        log::info!("Boxes with other labels: {}", self.boxes_ignored_label);

        let skipped_images = self.images_unmatched + self.images_invalid;
        if skipped_images > 0 {
            log::warn!(
                "Skipped image entries: {} (no matching image: {}, invalid size: {})",
                skipped_images,
                self.images_unmatched,
                self.images_invalid
            );
        }
        let rejected_boxes =
            self.boxes_rejected_attribute + self.boxes_rejected_geometry + self.boxes_unparseable;
        if rejected_boxes > 0 {
            log::warn!(
                "Rejected boxes: {} (attribute filter: {}, geometry: {}, unparseable: {})",
                rejected_boxes,
                self.boxes_rejected_attribute,
                self.boxes_rejected_geometry,
                self.boxes_unparseable
            );
        }
    }
}
