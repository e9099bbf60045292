//! Metrics emitted by the engine.
//!
//! Uses the `metrics` facade; without an installed recorder every call is a
//! no-op, so hosts opt in by installing an exporter.

use metrics::{counter, gauge};
use sitewatch_models::{AlertCategory, RiskLevel};

/// Metric names as constants for consistency.
pub mod names {
    // Tick loop
    pub const TICKS_TOTAL: &str = "sitewatch_ticks_total";
    pub const RISK_LEVEL: &str = "sitewatch_risk_level";

    // Alerts
    pub const ALERTS_TOTAL: &str = "sitewatch_alerts_total";
    pub const ALERTS_SUPPRESSED_TOTAL: &str = "sitewatch_alerts_suppressed_total";

    // Audit trail
    pub const REPORT_EVENTS_TOTAL: &str = "sitewatch_report_events_total";

    // Continuity tracker
    pub const TRACKER_INITS_TOTAL: &str = "sitewatch_tracker_inits_total";
    pub const TRACKER_RESETS_TOTAL: &str = "sitewatch_tracker_resets_total";
}

/// Record one processed tick and the resulting risk level.
pub fn record_tick(risk: RiskLevel) {
    counter!(names::TICKS_TOTAL).increment(1);
    gauge!(names::RISK_LEVEL).set(risk.as_level() as f64);
}

/// Record a counted alert.
pub fn record_alert(category: AlertCategory) {
    counter!(names::ALERTS_TOTAL, "category" => category.as_str()).increment(1);
}

/// Record an alert held back by its cooldown.
pub fn record_suppressed_alert(category: AlertCategory) {
    counter!(names::ALERTS_SUPPRESSED_TOTAL, "category" => category.as_str()).increment(1);
}

/// Record an event appended to the audit trail.
pub fn record_report_event(category: AlertCategory) {
    counter!(names::REPORT_EVENTS_TOTAL, "type" => category.as_str()).increment(1);
}

pub fn record_tracker_init() {
    counter!(names::TRACKER_INITS_TOTAL).increment(1);
}

pub fn record_tracker_reset() {
    counter!(names::TRACKER_RESETS_TOTAL).increment(1);
}
