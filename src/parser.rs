use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::attributes::{self, AttributeThresholds};
use crate::cvat::{read_annotations, CvatAnnotations, CvatBox};
use crate::geometry;
use crate::inventory::ImageInventory;
use crate::types::{
    AnnotationRecord, ImageRecord, NormalizedBox, ProcessingStats, RawBox, PRIMARY_CLASS_ID,
    PRIMARY_LABEL, SECONDARY_CLASS_ID, SECONDARY_LABELS,
};
use crate::utils::create_progress_bar;

/// Annotation records keyed by the image they belong to.
pub type AnnotationIndex = BTreeMap<ImageRecord, AnnotationRecord>;

/// Map a trimmed, lowercased annotation label to its class id.
pub fn class_for_label(label: &str) -> Option<usize> {
    if label == PRIMARY_LABEL {
        Some(PRIMARY_CLASS_ID)
    } else if SECONDARY_LABELS.contains(&label) {
        Some(SECONDARY_CLASS_ID)
    } else {
        None
    }
}

/// Union `record` into the entry for `image`. Merging is associative; feeding
/// the same document twice duplicates its boxes.
pub fn merge_record(index: &mut AnnotationIndex, image: &ImageRecord, record: AnnotationRecord) {
    match index.get_mut(image) {
        Some(existing) => existing.merge(record),
        None => {
            index.insert(image.clone(), record);
        }
    }
}

/// Parse every document and merge the accepted boxes per image.
///
/// Documents are deserialized in parallel, then merged sequentially in the
/// order given, so the result does not depend on thread scheduling.
/// Unreadable documents are skipped.
pub fn parse_documents(
    documents: &[PathBuf],
    inventory: &ImageInventory,
    thresholds: &AttributeThresholds,
) -> (AnnotationIndex, ProcessingStats) {
    let pb = create_progress_bar(documents.len() as u64, "XML");
    let parsed: Vec<_> = documents
        .par_iter()
        .map(|path| {
            let result = read_annotations(path);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("XML parsing complete");

    let mut index = AnnotationIndex::new();
    let mut stats = ProcessingStats::new();
    for result in parsed {
        match result {
            Ok(document) => {
                stats.documents_parsed += 1;
                ingest_document(&mut index, &document, inventory, thresholds, &mut stats);
            }
            Err(e) => {
                stats.documents_failed += 1;
                warn!("Skipping annotation document: {}", e);
            }
        }
    }
    (index, stats)
}

/// Merge the valid boxes of one parsed document into `index`.
pub fn ingest_document(
    index: &mut AnnotationIndex,
    document: &CvatAnnotations,
    inventory: &ImageInventory,
    thresholds: &AttributeThresholds,
    stats: &mut ProcessingStats,
) {
    for image in &document.images {
        let Some(name) = image.name.as_deref().filter(|n| !n.trim().is_empty()) else {
            stats.images_invalid += 1;
            continue;
        };
        let Some(record) = inventory.resolve(name) else {
            debug!("No image in inventory for annotation entry '{}'", name);
            stats.images_unmatched += 1;
            continue;
        };
        let Some((width, height)) = image.dimensions().filter(|&(w, h)| w > 0.0 && h > 0.0)
        else {
            warn!("Invalid declared size for '{}', skipping entry", name);
            stats.images_invalid += 1;
            continue;
        };
        stats.images_matched += 1;

        let mut annotation = AnnotationRecord::new();
        for entry in &image.boxes {
            if let Some(bbox) = convert_box(entry, width, height, thresholds, name, stats) {
                annotation.push(bbox);
            }
        }
        if !annotation.is_empty() {
            merge_record(index, record, annotation);
        }
    }
}

fn convert_box(
    entry: &CvatBox,
    image_width: f64,
    image_height: f64,
    thresholds: &AttributeThresholds,
    image_name: &str,
    stats: &mut ProcessingStats,
) -> Option<NormalizedBox> {
    let label = entry
        .label
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let Some(class_id) = class_for_label(&label) else {
        stats.boxes_ignored_label += 1;
        return None;
    };
    let Some((left, top, right, bottom)) = entry.corners() else {
        debug!("Unparseable '{}' box coordinates in '{}'", label, image_name);
        stats.boxes_unparseable += 1;
        return None;
    };
    let raw = RawBox {
        label,
        left,
        top,
        right,
        bottom,
        attributes: entry.attribute_map(),
    };
    normalize_raw_box(&raw, class_id, image_width, image_height, thresholds, image_name, stats)
}

/// Attribute filter first, then geometry. Both are pure, so the order only
/// saves work.
pub fn normalize_raw_box(
    raw: &RawBox,
    class_id: usize,
    image_width: f64,
    image_height: f64,
    thresholds: &AttributeThresholds,
    image_name: &str,
    stats: &mut ProcessingStats,
) -> Option<NormalizedBox> {
    let verdict = attributes::accepts(&raw.label, &raw.attributes, thresholds);
    if !verdict.is_accepted() {
        debug!("Dropping '{}' box in '{}': {}", raw.label, image_name, verdict);
        stats.boxes_rejected_attribute += 1;
        return None;
    }
    match geometry::normalize(
        class_id,
        raw.left,
        raw.top,
        raw.right,
        raw.bottom,
        image_width,
        image_height,
    ) {
        Ok(bbox) => {
            stats.boxes_accepted += 1;
            Some(bbox)
        }
        Err(rejection) => {
            debug!("Dropping '{}' box in '{}': {}", raw.label, image_name, rejection);
            stats.boxes_rejected_geometry += 1;
            None
        }
    }
}
