//! Alert categories, audit events and the exported session report.

use chrono::{DateTime, Utc};
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Alert category. Each has its own cooldown and its own event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    PeopleMismatch,
    HelmetMissing,
    HarnessMissing,
    UnsafeInstall,
}

impl AlertCategory {
    /// All alert categories, in evaluation order.
    pub const ALL: &'static [AlertCategory] = &[
        AlertCategory::PeopleMismatch,
        AlertCategory::HelmetMissing,
        AlertCategory::HarnessMissing,
        AlertCategory::UnsafeInstall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::PeopleMismatch => "people_mismatch",
            AlertCategory::HelmetMissing => "helmet_missing",
            AlertCategory::HarnessMissing => "harness_missing",
            AlertCategory::UnsafeInstall => "unsafe_install",
        }
    }

    /// Human-readable label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            AlertCategory::PeopleMismatch => "People count mismatch",
            AlertCategory::HelmetMissing => "Helmet missing",
            AlertCategory::HarnessMissing => "Harness missing",
            AlertCategory::UnsafeInstall => "Unsafe installation",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the session audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEvent {
    /// When the condition was recorded
    pub time: DateTime<Utc>,
    /// Condition type
    #[serde(rename = "type")]
    pub event_type: AlertCategory,
    /// Detail string with the live counts at record time
    pub detail: String,
}

impl ReportEvent {
    pub fn new(time: DateTime<Utc>, event_type: AlertCategory, detail: impl Into<String>) -> Self {
        Self {
            time,
            event_type,
            detail: detail.into(),
        }
    }
}

/// Unique identifier for a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thresholds in force during the session, copied into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThresholdSummary {
    pub expected_people: u32,
    pub people_hold_secs: f64,
    pub ppe_hold_secs: f64,
    pub unsafe_hold_secs: f64,
    pub people_cooldown_secs: f64,
    pub helmet_cooldown_secs: f64,
    pub harness_cooldown_secs: f64,
    pub unsafe_cooldown_secs: f64,
    pub tracker_reinit_every: u32,
    pub tracker_max_failures: u32,
}

/// Exported session report.
///
/// Field order is part of the contract: serializers emit fields in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub work_start: DateTime<Utc>,
    pub work_end: DateTime<Utc>,
    /// True when the session was still open at export time and
    /// `work_end` is the export time.
    pub implicit_end: bool,
    pub thresholds: ThresholdSummary,
    pub max_people_stable: u32,
    pub max_helmet_count: u32,
    pub max_harness_count: u32,
    pub total_abnormal_events: u64,
    pub total_alerts: u64,
    /// Chronological audit trail
    pub events: Vec<ReportEvent>,
}

impl SessionReport {
    /// Session duration in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.work_end - self.work_start).num_seconds()
    }
}

/// JSON schema of the exported report, for report-sink consumers.
pub fn report_schema() -> RootSchema {
    schemars::schema_for!(SessionReport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> SessionReport {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        SessionReport {
            session_id: SessionId::from_string("session-1"),
            work_start: start,
            work_end: start + chrono::Duration::seconds(90),
            implicit_end: false,
            thresholds: ThresholdSummary {
                expected_people: 2,
                people_hold_secs: 3.0,
                ppe_hold_secs: 6.0,
                unsafe_hold_secs: 5.0,
                people_cooldown_secs: 10.0,
                helmet_cooldown_secs: 20.0,
                harness_cooldown_secs: 20.0,
                unsafe_cooldown_secs: 30.0,
                tracker_reinit_every: 15,
                tracker_max_failures: 5,
            },
            max_people_stable: 3,
            max_helmet_count: 2,
            max_harness_count: 1,
            total_abnormal_events: 1,
            total_alerts: 1,
            events: vec![ReportEvent::new(start, AlertCategory::PeopleMismatch, "people 1/2")],
        }
    }

    #[test]
    fn test_report_field_order() {
        let json = serde_json::to_string(&sample_report()).unwrap();

        let keys = [
            "\"session_id\"",
            "\"work_start\"",
            "\"work_end\"",
            "\"implicit_end\"",
            "\"thresholds\"",
            "\"max_people_stable\"",
            "\"max_helmet_count\"",
            "\"max_harness_count\"",
            "\"total_abnormal_events\"",
            "\"total_alerts\"",
            "\"events\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn test_event_type_field_name() {
        let report = sample_report();
        let value = serde_json::to_value(&report.events[0]).unwrap();
        assert_eq!(value["type"], "people_mismatch");
        assert_eq!(value["detail"], "people 1/2");
    }

    #[test]
    fn test_report_round_trip_and_duration() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.duration_secs(), 90);
    }

    #[test]
    fn test_report_schema_lists_events() {
        let schema = serde_json::to_value(report_schema()).unwrap();
        assert!(schema["properties"]["events"].is_object());
    }
}
