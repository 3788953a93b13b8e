//! Serde model of a CVAT "images" XML export.
//!
//! Numeric attributes are kept as text so that a single malformed value only
//! drops the entry that carries it instead of the whole document. Shapes other
//! than `<box>` (polygons, polylines, points, tags) may be interleaved with the
//! boxes of an image; they are skipped.

use quick_xml::DeError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::DatasetError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CvatAnnotations {
    #[serde(rename = "image", default)]
    pub images: Vec<CvatImage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CvatImage {
    #[serde(rename = "@name")]
    pub name: Option<String>,
    #[serde(rename = "@width")]
    pub width: Option<String>,
    #[serde(rename = "@height")]
    pub height: Option<String>,
    #[serde(rename = "box", default)]
    pub boxes: Vec<CvatBox>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CvatBox {
    #[serde(rename = "@label")]
    pub label: Option<String>,
    #[serde(rename = "@xtl")]
    pub xtl: Option<String>,
    #[serde(rename = "@ytl")]
    pub ytl: Option<String>,
    #[serde(rename = "@xbr")]
    pub xbr: Option<String>,
    #[serde(rename = "@ybr")]
    pub ybr: Option<String>,
    #[serde(rename = "attribute", default)]
    pub attributes: Vec<CvatAttribute>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CvatAttribute {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl CvatImage {
    /// Declared `(width, height)`, or `None` if either is missing or not a number.
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        Some((parse_number(&self.width)?, parse_number(&self.height)?))
    }
}

impl CvatBox {
    /// `(xtl, ytl, xbr, ybr)`, or `None` if any corner is missing or not a number.
    pub fn corners(&self) -> Option<(f64, f64, f64, f64)> {
        Some((
            parse_number(&self.xtl)?,
            parse_number(&self.ytl)?,
            parse_number(&self.xbr)?,
            parse_number(&self.ybr)?,
        ))
    }

    pub fn attribute_map(&self) -> HashMap<String, String> {
        self.attributes
            .iter()
            .map(|attr| (attr.name.clone(), attr.value.trim().to_string()))
            .collect()
    }
}

fn parse_number(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()?.trim().parse::<f64>().ok()
}

pub fn parse_annotations_str(xml: &str) -> Result<CvatAnnotations, DeError> {
    quick_xml::de::from_str(xml)
}

/// Read and deserialize one annotation document from disk.
pub fn read_annotations(path: &Path) -> Result<CvatAnnotations, DatasetError> {
    let file = File::open(path).map_err(DatasetError::io(path))?;
    quick_xml::de::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Xml {
        path: path.to_path_buf(),
        source,
    })
}
