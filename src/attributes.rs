//! Threshold filter over the categorical size attributes of a box.
//!
//! CVAT exports store these attributes as free text. Each recognised text is
//! mapped to a bucket with a fixed lower bound in centimetres; anything else is
//! an unknown bucket and is reported separately from "below threshold".

use std::collections::HashMap;
use std::fmt;

use crate::types::{PRIMARY_LABEL, SECONDARY_LABELS};

/// Attribute carrying the step/stair height bucket.
pub const HEIGHT_ATTRIBUTE: &str = "height";
/// Attribute carrying the ramp width bucket.
pub const WIDTH_ATTRIBUTE: &str = "width";

/// Height bucket of a step or stair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepHeight {
    Below3Cm,
    From3To7Cm,
    Above7Cm,
}

impl StepHeight {
    const TABLE: [(&'static str, StepHeight); 3] = [
        ("less than 3cm", StepHeight::Below3Cm),
        ("3cm to 7cm", StepHeight::From3To7Cm),
        ("more than 7cm", StepHeight::Above7Cm),
    ];

    pub fn from_bucket(text: &str) -> Option<Self> {
        lookup(&Self::TABLE, text)
    }

    pub fn lower_bound_cm(self) -> u32 {
        match self {
            StepHeight::Below3Cm => 0,
            StepHeight::From3To7Cm => 3,
            StepHeight::Above7Cm => 7,
        }
    }
}

/// Width bucket of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampWidth {
    Below90Cm,
    From90To120Cm,
    Above120Cm,
}

impl RampWidth {
    const TABLE: [(&'static str, RampWidth); 3] = [
        ("less than 90cm", RampWidth::Below90Cm),
        ("90cm to 120cm", RampWidth::From90To120Cm),
        ("more than 120cm", RampWidth::Above120Cm),
    ];

    pub fn from_bucket(text: &str) -> Option<Self> {
        lookup(&Self::TABLE, text)
    }

    pub fn lower_bound_cm(self) -> u32 {
        match self {
            RampWidth::Below90Cm => 0,
            RampWidth::From90To120Cm => 90,
            RampWidth::Above120Cm => 120,
        }
    }
}

fn lookup<T: Copy>(table: &[(&str, T)], text: &str) -> Option<T> {
    let key = normalize_bucket(text);
    table
        .iter()
        .find(|(bucket, _)| *bucket == key)
        .map(|(_, value)| *value)
}

// Lowercase and collapse runs of whitespace.
fn normalize_bucket(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Minimum attribute values, in centimetres. `None` disables the filter for
/// that label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeThresholds {
    pub min_ramp_width_cm: Option<u32>,
    pub min_step_height_cm: Option<u32>,
}

/// Outcome of the attribute filter for one box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeVerdict {
    Accepted,
    Missing {
        attribute: &'static str,
    },
    UnknownBucket {
        attribute: &'static str,
        value: String,
    },
    BelowThreshold {
        attribute: &'static str,
        value_cm: u32,
        threshold_cm: u32,
    },
}

impl AttributeVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AttributeVerdict::Accepted)
    }
}

impl fmt::Display for AttributeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeVerdict::Accepted => f.write_str("accepted"),
            AttributeVerdict::Missing { attribute } => {
                write!(f, "missing '{}' attribute", attribute)
            }
            AttributeVerdict::UnknownBucket { attribute, value } => {
                write!(f, "unknown '{}' bucket '{}'", attribute, value)
            }
            AttributeVerdict::BelowThreshold {
                attribute,
                value_cm,
                threshold_cm,
            } => write!(
                f,
                "'{}' of {}cm is below threshold {}cm",
                attribute, value_cm, threshold_cm
            ),
        }
    }
}

/// Decide whether a box with `label` and `attributes` passes the configured
/// thresholds. `label` must already be trimmed and lowercased.
pub fn accepts(
    label: &str,
    attributes: &HashMap<String, String>,
    thresholds: &AttributeThresholds,
) -> AttributeVerdict {
    if label == PRIMARY_LABEL {
        if let Some(threshold) = thresholds.min_ramp_width_cm {
            return check(
                attributes,
                WIDTH_ATTRIBUTE,
                threshold,
                |text| RampWidth::from_bucket(text).map(RampWidth::lower_bound_cm),
            );
        }
    } else if SECONDARY_LABELS.contains(&label) {
        if let Some(threshold) = thresholds.min_step_height_cm {
            return check(
                attributes,
                HEIGHT_ATTRIBUTE,
                threshold,
                |text| StepHeight::from_bucket(text).map(StepHeight::lower_bound_cm),
            );
        }
    }
    AttributeVerdict::Accepted
}

fn check(
    attributes: &HashMap<String, String>,
    attribute: &'static str,
    threshold_cm: u32,
    bucket_value: impl Fn(&str) -> Option<u32>,
) -> AttributeVerdict {
    let Some(text) = attributes
        .iter()
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(attribute))
        .map(|(_, value)| value)
    else {
        return AttributeVerdict::Missing { attribute };
    };
    match bucket_value(text.as_str()) {
        None => AttributeVerdict::UnknownBucket {
            attribute,
            value: text.clone(),
        },
        Some(value_cm) if value_cm < threshold_cm => AttributeVerdict::BelowThreshold {
            attribute,
            value_cm,
            threshold_cm,
        },
        Some(_) => AttributeVerdict::Accepted,
    }
}
