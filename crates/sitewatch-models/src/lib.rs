//! Shared data models for SiteWatch.
//!
//! This crate provides Serde-serializable types for:
//! - Pixel-space bounding boxes and per-category detections
//! - Compliance snapshots and risk levels
//! - Alert categories, report events and session reports

pub mod compliance;
pub mod detection;
pub mod geometry;
pub mod report;

// Re-export common types
pub use compliance::{ComplianceSnapshot, PpeStatus, RiskLevel};
pub use detection::{ContinuityBox, Detection, DetectionCategory, PpeItem};
pub use geometry::BoundingBox;
pub use report::{
    report_schema, AlertCategory, ReportEvent, SessionId, SessionReport, ThresholdSummary,
};
