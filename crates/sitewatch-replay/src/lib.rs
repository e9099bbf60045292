//! Replays an annotated frame sequence through the safety engine.
//!
//! This crate provides:
//! - YOLO label-file parsing into validated detections
//! - Channel and frame sequence discovery, prediction-file lookup
//! - Per-category detector pollers feeding a shared inbox
//! - A real-time frame ticker and the JSON report sink

pub mod config;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod replay;
pub mod sequence;

pub use config::{EnabledDetectors, PredictionFolders, ReplayConfig};
pub use error::{ReplayError, ReplayResult};
pub use labels::LabelResolver;
pub use replay::{write_report, DetectorPoller, FrameStep, ReplayDriver};
pub use sequence::{discover_channels, select_channel, FrameSequence};
