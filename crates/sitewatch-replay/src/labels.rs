//! YOLO label-file adapter.
//!
//! Each line is `class_id cx cy w h [conf]` with normalized center
//! coordinates. Lines are converted to pixel corners on the frame, clamped
//! into the frame and validated here, so the engine only ever sees
//! well-formed boxes.

use std::collections::HashMap;
use std::path::Path;

use sitewatch_models::{BoundingBox, Detection, DetectionCategory};
use tracing::trace;

use crate::error::ReplayResult;

/// Class-id to class-name maps per detector family.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    pub uc: HashMap<i32, String>,
    pub ppe: HashMap<i32, String>,
    pub high_risk: HashMap<i32, String>,
}

impl Default for LabelResolver {
    fn default() -> Self {
        Self {
            uc: HashMap::from([(0, "UC-07".to_string()), (1, "UC-08".to_string())]),
            ppe: HashMap::from([(0, "helmet".to_string()), (1, "harness".to_string())]),
            high_risk: HashMap::new(),
        }
    }
}

impl LabelResolver {
    /// Resolve a class id to its label for a detector family.
    pub fn resolve(&self, category: DetectionCategory, class_id: i32) -> String {
        let (map, prefix) = match category {
            DetectionCategory::Person => return "person".to_string(),
            DetectionCategory::Uc => (&self.uc, "UC"),
            DetectionCategory::Ppe => (&self.ppe, "PPE"),
            DetectionCategory::HighRisk => (&self.high_risk, "HR"),
        };
        map.get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("{}_{}", prefix, class_id))
    }
}

/// Parse a single label line. Malformed or degenerate lines yield `None`.
pub fn parse_line(
    line: &str,
    category: DetectionCategory,
    resolver: &LabelResolver,
    frame_width: u32,
    frame_height: u32,
) -> Option<Detection> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }

    let class_id: i32 = fields[0].parse().ok()?;
    let mut coords = [0.0f64; 4];
    for (slot, field) in coords.iter_mut().zip(&fields[1..5]) {
        *slot = field.parse().ok()?;
    }
    if coords.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let confidence = fields
        .get(5)
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|c| c.is_finite())
        .unwrap_or(1.0);

    let [cx, cy, w, h] = coords;
    let bbox = BoundingBox::from_normalized_center(cx, cy, w, h, frame_width, frame_height)
        .clamp(frame_width, frame_height);
    if !bbox.is_valid() {
        return None;
    }

    Some(Detection::new(
        category,
        resolver.resolve(category, class_id),
        confidence,
        bbox,
    ))
}

/// Parse a whole label file body.
pub fn parse_labels(
    text: &str,
    category: DetectionCategory,
    resolver: &LabelResolver,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Detection> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let detection = parse_line(line, category, resolver, frame_width, frame_height);
            if detection.is_none() {
                trace!(category = %category, line, "Dropped label line");
            }
            detection
        })
        .collect()
}

/// Read a label file. A missing file is an empty observation.
pub fn load_label_file(
    path: &Path,
    category: DetectionCategory,
    resolver: &LabelResolver,
    frame_width: u32,
    frame_height: u32,
) -> ReplayResult<Vec<Detection>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_labels(&text, category, resolver, frame_width, frame_height)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LabelResolver {
        LabelResolver::default()
    }

    #[test]
    fn test_normalized_center_to_pixels() {
        let det = parse_line("0 0.5 0.5 0.2 0.2", DetectionCategory::Person, &resolver(), 640, 480)
            .unwrap();
        assert_eq!(det.class_label, "person");
        assert_eq!(det.confidence, 1.0);
        assert!((det.bbox.x1 - 224.0).abs() < 1e-9);
        assert!((det.bbox.y1 - 168.0).abs() < 1e-9);
        assert!((det.bbox.x2 - 416.0).abs() < 1e-9);
        assert!((det.bbox.y2 - 312.0).abs() < 1e-9);
    }

    #[test]
    fn test_optional_confidence_and_tabs() {
        let det = parse_line("1\t0.5 0.5\t0.1 0.1 0.42", DetectionCategory::Uc, &resolver(), 100, 100)
            .unwrap();
        assert_eq!(det.class_label, "UC-08");
        assert_eq!(det.confidence, 0.42);
    }

    #[test]
    fn test_class_fallbacks() {
        let r = resolver();
        assert_eq!(r.resolve(DetectionCategory::Uc, 7), "UC_7");
        assert_eq!(r.resolve(DetectionCategory::Ppe, 0), "helmet");
        assert_eq!(r.resolve(DetectionCategory::Ppe, 5), "PPE_5");
        assert_eq!(r.resolve(DetectionCategory::HighRisk, 2), "HR_2");
        assert_eq!(r.resolve(DetectionCategory::Person, 3), "person");
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let r = resolver();
        for line in [
            "0 0.5 0.5 0.2",
            "x 0.5 0.5 0.2 0.2",
            "0 0.5 abc 0.2 0.2",
            "0 NaN 0.5 0.2 0.2",
            "0 0.5 0.5 0 0.2",
            "0.5 0.5 0.5 0.2 0.2",
        ] {
            assert!(parse_line(line, DetectionCategory::Person, &r, 640, 480).is_none(), "{}", line);
        }
    }

    #[test]
    fn test_negative_class_id_uses_fallback_label() {
        let r = resolver();
        let det = parse_line("-1 0.5 0.5 0.2 0.2", DetectionCategory::Uc, &r, 640, 480).unwrap();
        assert_eq!(det.class_label, "UC_-1");
        assert_eq!(r.resolve(DetectionCategory::Ppe, -3), "PPE_-3");
    }

    #[test]
    fn test_box_clamped_into_frame() {
        let det = parse_line("0 0.95 0.5 0.2 0.2", DetectionCategory::Person, &resolver(), 640, 480)
            .unwrap();
        assert_eq!(det.bbox.x2, 639.0);
        assert!(det.bbox.x1 < det.bbox.x2);

        // Fully outside the frame collapses to a degenerate box.
        assert!(parse_line("0 1.5 0.5 0.1 0.1", DetectionCategory::Person, &resolver(), 640, 480)
            .is_none());
    }

    #[test]
    fn test_parse_labels_skips_blank_lines() {
        let text = "0 0.5 0.5 0.2 0.2\n\n   \n1 0.25 0.25 0.1 0.1 0.9\ngarbage\n";
        let dets = parse_labels(text, DetectionCategory::Ppe, &resolver(), 640, 480);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_label, "helmet");
        assert_eq!(dets[1].class_label, "harness");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dets = load_label_file(
            &dir.path().join("missing.txt"),
            DetectionCategory::Uc,
            &resolver(),
            640,
            480,
        )
        .unwrap();
        assert!(dets.is_empty());
    }
}
