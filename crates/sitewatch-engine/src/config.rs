//! Configuration for the safety engine.
//!
//! Loaded once per session. Durations are expressed in seconds as `f64`
//! and converted to [`chrono::Duration`] at the point of comparison.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use sitewatch_models::{AlertCategory, PpeItem, ThresholdSummary};

/// Smallest hold window or cooldown accepted after sanitizing (seconds).
pub const MIN_WINDOW_SECS: f64 = 0.1;

/// Configuration for the safety engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Compliance ===
    /// Number of people expected on site (default: 2)
    #[serde(deserialize_with = "saturating_count")]
    pub expected_people: u32,

    // === Hold windows ===
    /// How long a people count stays authoritative without detections (default: 3.0)
    pub people_hold_secs: f64,

    /// How long a PPE item stays compliant after its last compliant tick (default: 6.0)
    pub ppe_hold_secs: f64,

    /// How long an unsafe-code set stays authoritative (default: 5.0)
    pub unsafe_hold_secs: f64,

    // === Alert cooldowns ===
    pub people_cooldown_secs: f64,
    pub helmet_cooldown_secs: f64,
    pub harness_cooldown_secs: f64,
    pub unsafe_cooldown_secs: f64,

    // === Event recorder ===
    /// Identical (type, detail) events closer than this are dropped (default: 1.0)
    pub event_dedup_secs: f64,

    // === Continuity tracker ===
    /// Re-initialize the tracker every N ticks when a detection is available (default: 15)
    #[serde(deserialize_with = "saturating_count")]
    pub tracker_reinit_every: u32,

    /// Consecutive update failures before a forced reset (default: 5)
    #[serde(deserialize_with = "saturating_count")]
    pub tracker_max_failures: u32,

    // === Detection filtering ===
    /// Minimum confidence for person boxes (default: 0.25)
    pub person_min_confidence: f64,

    /// Minimum confidence for PPE boxes (default: 0.25)
    pub ppe_min_confidence: f64,

    /// Minimum confidence for UC/high-risk boxes (default: 0.25)
    pub unsafe_min_confidence: f64,

    /// Class labels counted as a helmet (case-insensitive)
    pub helmet_labels: Vec<String>,

    /// Class labels counted as a harness (case-insensitive)
    pub harness_labels: Vec<String>,

    /// Unsafe-code allow-list: code -> display name
    pub unsafe_codes: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut unsafe_codes = BTreeMap::new();
        unsafe_codes.insert("UC-07".to_string(), "Ladder without outrigger".to_string());
        unsafe_codes.insert("UC-08".to_string(), "Platform guardrail missing".to_string());

        Self {
            expected_people: 2,

            people_hold_secs: 3.0,
            ppe_hold_secs: 6.0,
            unsafe_hold_secs: 5.0,

            people_cooldown_secs: 10.0,
            helmet_cooldown_secs: 20.0,
            harness_cooldown_secs: 20.0,
            unsafe_cooldown_secs: 30.0,

            event_dedup_secs: 1.0,

            tracker_reinit_every: 15,
            tracker_max_failures: 5,

            person_min_confidence: 0.25,
            ppe_min_confidence: 0.25,
            unsafe_min_confidence: 0.25,

            helmet_labels: vec!["helmet".to_string(), "hardhat".to_string()],
            harness_labels: vec!["harness".to_string(), "safety_harness".to_string()],
            unsafe_codes,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document and sanitize the result.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.sanitize())
    }

    /// Load a JSON config file and sanitize the result.
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Same config with a different expected head count.
    pub fn with_expected_people(mut self, expected_people: u32) -> Self {
        self.expected_people = expected_people;
        self
    }

    /// Clamp out-of-range values to safe minimums.
    ///
    /// Non-finite or too-small durations become [`MIN_WINDOW_SECS`], tick
    /// counts become at least 1 and confidences are clamped into `[0, 1]`.
    pub fn sanitize(mut self) -> Self {
        for (name, value) in [
            ("people_hold_secs", &mut self.people_hold_secs),
            ("ppe_hold_secs", &mut self.ppe_hold_secs),
            ("unsafe_hold_secs", &mut self.unsafe_hold_secs),
            ("people_cooldown_secs", &mut self.people_cooldown_secs),
            ("helmet_cooldown_secs", &mut self.helmet_cooldown_secs),
            ("harness_cooldown_secs", &mut self.harness_cooldown_secs),
            ("unsafe_cooldown_secs", &mut self.unsafe_cooldown_secs),
            ("event_dedup_secs", &mut self.event_dedup_secs),
        ] {
            if !value.is_finite() || *value < MIN_WINDOW_SECS {
                warn!(field = name, value = *value, clamped = MIN_WINDOW_SECS, "Clamping duration");
                *value = MIN_WINDOW_SECS;
            }
        }

        for (name, value) in [
            ("tracker_reinit_every", &mut self.tracker_reinit_every),
            ("tracker_max_failures", &mut self.tracker_max_failures),
        ] {
            if *value == 0 {
                warn!(field = name, clamped = 1, "Clamping tick count");
                *value = 1;
            }
        }

        for (name, value) in [
            ("person_min_confidence", &mut self.person_min_confidence),
            ("ppe_min_confidence", &mut self.ppe_min_confidence),
            ("unsafe_min_confidence", &mut self.unsafe_min_confidence),
        ] {
            let clamped = if value.is_finite() { (*value).clamp(0.0, 1.0) } else { 0.0 };
            if clamped != *value {
                warn!(field = name, value = *value, clamped, "Clamping confidence");
                *value = clamped;
            }
        }

        self
    }

    pub fn people_hold(&self) -> Duration {
        secs_to_duration(self.people_hold_secs)
    }

    pub fn ppe_hold(&self) -> Duration {
        secs_to_duration(self.ppe_hold_secs)
    }

    pub fn unsafe_hold(&self) -> Duration {
        secs_to_duration(self.unsafe_hold_secs)
    }

    pub fn event_dedup_window(&self) -> Duration {
        secs_to_duration(self.event_dedup_secs)
    }

    /// Cooldown for an alert category.
    pub fn cooldown(&self, category: AlertCategory) -> Duration {
        let secs = match category {
            AlertCategory::PeopleMismatch => self.people_cooldown_secs,
            AlertCategory::HelmetMissing => self.helmet_cooldown_secs,
            AlertCategory::HarnessMissing => self.harness_cooldown_secs,
            AlertCategory::UnsafeInstall => self.unsafe_cooldown_secs,
        };
        secs_to_duration(secs)
    }

    /// Map a PPE class label to the item it counts towards.
    pub fn ppe_item_for_label(&self, label: &str) -> Option<PpeItem> {
        let matches = |labels: &[String]| labels.iter().any(|l| l.eq_ignore_ascii_case(label));

        if matches(&self.helmet_labels) {
            Some(PpeItem::Helmet)
        } else if matches(&self.harness_labels) {
            Some(PpeItem::Harness)
        } else {
            None
        }
    }

    /// Display name of an allow-listed unsafe code, `None` if not allowed.
    pub fn unsafe_display_name(&self, code: &str) -> Option<&str> {
        self.unsafe_codes.get(code).map(String::as_str)
    }

    /// Thresholds copied into exported reports.
    pub fn threshold_summary(&self) -> ThresholdSummary {
        ThresholdSummary {
            expected_people: self.expected_people,
            people_hold_secs: self.people_hold_secs,
            ppe_hold_secs: self.ppe_hold_secs,
            unsafe_hold_secs: self.unsafe_hold_secs,
            people_cooldown_secs: self.people_cooldown_secs,
            helmet_cooldown_secs: self.helmet_cooldown_secs,
            harness_cooldown_secs: self.harness_cooldown_secs,
            unsafe_cooldown_secs: self.unsafe_cooldown_secs,
            tracker_reinit_every: self.tracker_reinit_every,
            tracker_max_failures: self.tracker_max_failures,
        }
    }
}

/// Accept any JSON integer for a count field, saturating into `u32`.
fn saturating_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = u32::try_from(raw.max(0)).unwrap_or(u32::MAX);
    if i64::from(clamped) != raw {
        warn!(value = raw, clamped, "Clamping count");
    }
    Ok(clamped)
}

/// Convert seconds to a millisecond-precision duration.
pub(crate) fn secs_to_duration(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.expected_people, 2);
        assert_eq!(config.people_hold(), Duration::seconds(3));
        assert_eq!(config.ppe_hold(), Duration::seconds(6));
        assert_eq!(config.unsafe_hold(), Duration::seconds(5));
        assert_eq!(config.cooldown(AlertCategory::PeopleMismatch), Duration::seconds(10));
        assert_eq!(config.cooldown(AlertCategory::HelmetMissing), Duration::seconds(20));
        assert_eq!(config.cooldown(AlertCategory::HarnessMissing), Duration::seconds(20));
        assert_eq!(config.cooldown(AlertCategory::UnsafeInstall), Duration::seconds(30));
        assert_eq!(config.tracker_reinit_every, 15);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "expected_people": 4, "ppe_hold_secs": 2.5 }"#)
            .unwrap();
        assert_eq!(config.expected_people, 4);
        assert_eq!(config.ppe_hold(), Duration::milliseconds(2500));
        assert_eq!(config.people_hold_secs, 3.0);
    }

    #[test]
    fn test_negative_durations_are_clamped() {
        let config = EngineConfig::from_json_str(
            r#"{ "people_cooldown_secs": -5.0, "unsafe_hold_secs": 0.0, "tracker_reinit_every": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.people_cooldown_secs, MIN_WINDOW_SECS);
        assert_eq!(config.unsafe_hold_secs, MIN_WINDOW_SECS);
        assert_eq!(config.tracker_reinit_every, 1);
        assert!(config.cooldown(AlertCategory::PeopleMismatch) > Duration::zero());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let config = EngineConfig {
            person_min_confidence: 1.7,
            ppe_min_confidence: -0.2,
            unsafe_min_confidence: f64::NAN,
            ..Default::default()
        }
        .sanitize();
        assert_eq!(config.person_min_confidence, 1.0);
        assert_eq!(config.ppe_min_confidence, 0.0);
        assert_eq!(config.unsafe_min_confidence, 0.0);
    }

    #[test]
    fn test_negative_counts_are_clamped() {
        let config = EngineConfig::from_json_str(
            r#"{ "expected_people": -1, "tracker_reinit_every": -5, "tracker_max_failures": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.expected_people, 0);
        assert_eq!(config.tracker_reinit_every, 1);
        assert_eq!(config.tracker_max_failures, 1);
    }

    #[test]
    fn test_oversized_count_saturates() {
        let config =
            EngineConfig::from_json_str(r#"{ "tracker_reinit_every": 5000000000 }"#).unwrap();
        assert_eq!(config.tracker_reinit_every, u32::MAX);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = EngineConfig::from_json_str(r#"{ "expected_people": "two" }"#).unwrap_err();
        assert!(matches!(err, EngineError::JsonParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "unsafe_codes": {{ "UC-11": "Open edge" }} }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.unsafe_display_name("UC-11"), Some("Open edge"));
        assert_eq!(config.unsafe_display_name("UC-07"), None);

        let missing = EngineConfig::from_file("/nonexistent/sitewatch.json").unwrap_err();
        assert!(matches!(missing, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_ppe_label_mapping() {
        let config = EngineConfig::default();
        assert_eq!(config.ppe_item_for_label("Helmet"), Some(PpeItem::Helmet));
        assert_eq!(config.ppe_item_for_label("HARNESS"), Some(PpeItem::Harness));
        assert_eq!(config.ppe_item_for_label("vest"), None);
    }
}
