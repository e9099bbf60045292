//! Per-tick detections supplied by external detectors.
//!
//! Four detector families feed the engine:
//!
//! - `Person`: person presence boxes (the only source of people counts)
//! - `Uc`: unsafe-installation codes from the UC classifier
//! - `Ppe`: personal protective equipment items (helmet, harness, ...)
//! - `HighRisk`: structural/high-risk detectors, also emitting unsafe codes

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoundingBox;

/// Detector family a detection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectionCategory {
    Person,
    Uc,
    Ppe,
    HighRisk,
}

impl DetectionCategory {
    /// All detector families, in tick processing order.
    pub const ALL: &'static [DetectionCategory] = &[
        DetectionCategory::Person,
        DetectionCategory::Uc,
        DetectionCategory::Ppe,
        DetectionCategory::HighRisk,
    ];

    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionCategory::Person => "person",
            DetectionCategory::Uc => "uc",
            DetectionCategory::Ppe => "ppe",
            DetectionCategory::HighRisk => "high_risk",
        }
    }

    /// Returns true if detections of this family carry unsafe-install codes.
    pub fn carries_unsafe_codes(&self) -> bool {
        matches!(self, DetectionCategory::Uc | DetectionCategory::HighRisk)
    }
}

impl fmt::Display for DetectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single labeled box from an external detector, scoped to one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Detector family
    pub category: DetectionCategory,
    /// Resolved class label (e.g. "person", "helmet", "UC-07")
    pub class_label: String,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
    /// Pixel-space box
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a new detection.
    pub fn new(
        category: DetectionCategory,
        class_label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            category,
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }

    /// Shorthand for a person detection.
    pub fn person(confidence: f64, bbox: BoundingBox) -> Self {
        Self::new(DetectionCategory::Person, "person", confidence, bbox)
    }
}

/// Synthetic person box produced by the continuity tracker.
///
/// Carries the same geometry as a [`Detection`] but is a distinct type so it
/// can never be fed into counting or compliance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContinuityBox {
    /// Tracked box in pixel coordinates
    pub bbox: BoundingBox,
    /// Ticks since the person detector last produced a box
    pub frames_since_detector_hit: u32,
}

/// Protective equipment items with a compliance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PpeItem {
    Helmet,
    Harness,
}

impl PpeItem {
    /// All tracked PPE items.
    pub const ALL: &'static [PpeItem] = &[PpeItem::Helmet, PpeItem::Harness];

    /// Returns the item name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PpeItem::Helmet => "helmet",
            PpeItem::Harness => "harness",
        }
    }
}

impl fmt::Display for PpeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&DetectionCategory::HighRisk).unwrap();
        assert_eq!(json, "\"high_risk\"");

        let parsed: DetectionCategory = serde_json::from_str("\"uc\"").unwrap();
        assert_eq!(parsed, DetectionCategory::Uc);
    }

    #[test]
    fn test_unsafe_code_carriers() {
        assert!(DetectionCategory::Uc.carries_unsafe_codes());
        assert!(DetectionCategory::HighRisk.carries_unsafe_codes());
        assert!(!DetectionCategory::Person.carries_unsafe_codes());
        assert!(!DetectionCategory::Ppe.carries_unsafe_codes());
    }
}
