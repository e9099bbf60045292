//! Replay-side metrics and the optional Prometheus exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use sitewatch_models::DetectionCategory;

use crate::error::{ReplayError, ReplayResult};

pub mod names {
    pub const FRAMES_PLAYED_TOTAL: &str = "sitewatch_frames_played_total";
    pub const DETECTOR_LOADS_TOTAL: &str = "sitewatch_detector_loads_total";
    pub const DETECTOR_LOAD_ERRORS_TOTAL: &str = "sitewatch_detector_load_errors_total";
    pub const DETECTOR_LOAD_SECONDS: &str = "sitewatch_detector_load_seconds";
}

/// Install a Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_prometheus(addr: SocketAddr) -> ReplayResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ReplayError::config_error(format!("prometheus exporter: {}", e)))
}

pub fn record_frame() {
    counter!(names::FRAMES_PLAYED_TOTAL).increment(1);
}

/// Record one detector poll and how long the load took.
pub fn record_detector_load(category: DetectionCategory, elapsed: Duration, ok: bool) {
    let label = category.as_str();
    counter!(names::DETECTOR_LOADS_TOTAL, "category" => label).increment(1);
    histogram!(names::DETECTOR_LOAD_SECONDS, "category" => label).record(elapsed.as_secs_f64());
    if !ok {
        counter!(names::DETECTOR_LOAD_ERRORS_TOTAL, "category" => label).increment(1);
    }
}
