//! Replay configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sitewatch_engine::EngineConfig;
use sitewatch_models::DetectionCategory;
use tracing::info;

use crate::error::ReplayResult;
use crate::sequence::{discover_channels, select_channel};

/// Floor for the person and PPE poller intervals.
pub const MIN_SLOW_POLL_MS: u64 = 300;
/// Floor for the UC and high-risk poller intervals.
pub const MIN_FAST_POLL_MS: u64 = 200;

/// Prediction sub-folder per detector family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionFolders {
    pub person: String,
    pub ppe: String,
    pub uc: String,
    pub high_risk: String,
}

impl Default for PredictionFolders {
    fn default() -> Self {
        Self {
            person: "pred_person".to_string(),
            ppe: "pred_ppe".to_string(),
            uc: "pred_uc".to_string(),
            high_risk: "pred_highrisk".to_string(),
        }
    }
}

impl PredictionFolders {
    pub fn for_category(&self, category: DetectionCategory) -> &str {
        match category {
            DetectionCategory::Person => &self.person,
            DetectionCategory::Ppe => &self.ppe,
            DetectionCategory::Uc => &self.uc,
            DetectionCategory::HighRisk => &self.high_risk,
        }
    }
}

/// Which detector families poll during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledDetectors {
    pub person: bool,
    pub ppe: bool,
    pub uc: bool,
    pub high_risk: bool,
}

impl Default for EnabledDetectors {
    fn default() -> Self {
        Self {
            person: true,
            ppe: true,
            uc: true,
            high_risk: true,
        }
    }
}

impl EnabledDetectors {
    pub fn is_enabled(&self, category: DetectionCategory) -> bool {
        match category {
            DetectionCategory::Person => self.person,
            DetectionCategory::Ppe => self.ppe,
            DetectionCategory::Uc => self.uc,
            DetectionCategory::HighRisk => self.high_risk,
        }
    }

    /// Enabled families in [`DetectionCategory::ALL`] order.
    pub fn categories(&self) -> Vec<DetectionCategory> {
        DetectionCategory::ALL
            .iter()
            .copied()
            .filter(|category| self.is_enabled(*category))
            .collect()
    }
}

/// Replay configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Directory holding the frame images and prediction folders; used
    /// when no dataset root is set
    pub sequence_dir: PathBuf,
    /// Directory whose sub-directories are selectable sequences (channels)
    pub dataset_root: Option<PathBuf>,
    /// Channel selected at startup (case-insensitive); first when unset or missing
    pub default_sequence: Option<String>,
    /// Continue with the next channel when a sequence ends
    pub play_all_channels: bool,
    /// Playback rate in frames per second
    pub fps: u32,
    /// Optional engine config JSON; defaults apply when unset
    pub engine_config_path: Option<PathBuf>,
    /// Where the session report is written on stop
    pub report_path: PathBuf,
    /// Wrap to the first frame instead of stopping at the end
    pub loop_playback: bool,
    pub person_interval: Duration,
    pub ppe_interval: Duration,
    pub uc_interval: Duration,
    pub high_risk_interval: Duration,
    pub detectors: EnabledDetectors,
    pub pred_folders: PredictionFolders,
    /// Coasting updates the fallback tracker allows between detector hits
    pub tracker_max_coast: u32,
    /// Prometheus listener address; metrics stay local when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sequence_dir: PathBuf::from("./sequence"),
            dataset_root: None,
            default_sequence: None,
            play_all_channels: false,
            fps: 30,
            engine_config_path: None,
            report_path: PathBuf::from("sitewatch_report.json"),
            loop_playback: false,
            person_interval: Duration::from_millis(1200),
            ppe_interval: Duration::from_millis(1400),
            uc_interval: Duration::from_millis(1000),
            high_risk_interval: Duration::from_millis(1000),
            detectors: EnabledDetectors::default(),
            pred_folders: PredictionFolders::default(),
            tracker_max_coast: 30,
            metrics_addr: None,
        }
    }
}

impl ReplayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let defaults_folders = defaults.pred_folders.clone();

        Self {
            sequence_dir: std::env::var("SITEWATCH_SEQUENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.sequence_dir),
            dataset_root: std::env::var("SITEWATCH_DATASET_ROOT").ok().map(PathBuf::from),
            default_sequence: std::env::var("SITEWATCH_DEFAULT_SEQUENCE")
                .ok()
                .filter(|name| !name.trim().is_empty()),
            play_all_channels: env_flag("SITEWATCH_PLAY_ALL_CHANNELS", false),
            fps: std::env::var("SITEWATCH_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps| *fps > 0)
                .unwrap_or(defaults.fps),
            engine_config_path: std::env::var("SITEWATCH_ENGINE_CONFIG").ok().map(PathBuf::from),
            report_path: std::env::var("SITEWATCH_REPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_path),
            loop_playback: env_flag("SITEWATCH_LOOP", false),
            person_interval: poll_interval("SITEWATCH_PERSON_INTERVAL_MS", 1200, MIN_SLOW_POLL_MS),
            ppe_interval: poll_interval("SITEWATCH_PPE_INTERVAL_MS", 1400, MIN_SLOW_POLL_MS),
            uc_interval: poll_interval("SITEWATCH_UC_INTERVAL_MS", 1000, MIN_FAST_POLL_MS),
            high_risk_interval: poll_interval(
                "SITEWATCH_HIGHRISK_INTERVAL_MS",
                1000,
                MIN_FAST_POLL_MS,
            ),
            detectors: EnabledDetectors {
                person: env_flag("SITEWATCH_PERSON_ENABLED", true),
                ppe: env_flag("SITEWATCH_PPE_ENABLED", true),
                uc: env_flag("SITEWATCH_UC_ENABLED", true),
                high_risk: env_flag("SITEWATCH_HIGHRISK_ENABLED", true),
            },
            pred_folders: PredictionFolders {
                person: std::env::var("SITEWATCH_PRED_PERSON").unwrap_or(defaults_folders.person),
                ppe: std::env::var("SITEWATCH_PRED_PPE").unwrap_or(defaults_folders.ppe),
                uc: std::env::var("SITEWATCH_PRED_UC").unwrap_or(defaults_folders.uc),
                high_risk: std::env::var("SITEWATCH_PRED_HIGHRISK")
                    .unwrap_or(defaults_folders.high_risk),
            },
            tracker_max_coast: std::env::var("SITEWATCH_TRACKER_MAX_COAST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tracker_max_coast),
            metrics_addr: std::env::var("SITEWATCH_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Period of the frame ticker.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis((1000 / self.fps.max(1) as u64).max(1))
    }

    /// Poll interval of one detector family.
    pub fn poll_interval(&self, category: DetectionCategory) -> Duration {
        match category {
            DetectionCategory::Person => self.person_interval,
            DetectionCategory::Ppe => self.ppe_interval,
            DetectionCategory::Uc => self.uc_interval,
            DetectionCategory::HighRisk => self.high_risk_interval,
        }
    }

    /// Selectable sequence directories and the index to start on.
    ///
    /// Without a dataset root the single `sequence_dir` is the only channel.
    pub fn channels(&self) -> ReplayResult<(Vec<PathBuf>, usize)> {
        match &self.dataset_root {
            Some(root) => {
                let channels = discover_channels(root)?;
                let selected = select_channel(&channels, self.default_sequence.as_deref());
                Ok((channels, selected))
            }
            None => Ok((vec![self.sequence_dir.clone()], 0)),
        }
    }

    /// Load the engine config file, or the defaults when none is set.
    pub fn load_engine_config(&self) -> ReplayResult<EngineConfig> {
        match &self.engine_config_path {
            Some(path) => {
                info!(path = %path.display(), "Loading engine config");
                Ok(EngineConfig::from_file(path)?)
            }
            None => Ok(EngineConfig::default()),
        }
    }
}

fn env_flag(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn poll_interval(var: &str, default_ms: u64, floor_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms.max(floor_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(33));
        assert_eq!(config.poll_interval(DetectionCategory::Ppe), Duration::from_millis(1400));
        assert_eq!(config.pred_folders.for_category(DetectionCategory::HighRisk), "pred_highrisk");
    }

    #[test]
    fn test_poll_interval_floor() {
        std::env::set_var("SITEWATCH_TEST_PERSON_INTERVAL_MS", "50");
        std::env::set_var("SITEWATCH_TEST_UC_INTERVAL_MS", "50");
        assert_eq!(
            poll_interval("SITEWATCH_TEST_PERSON_INTERVAL_MS", 1200, MIN_SLOW_POLL_MS),
            Duration::from_millis(300)
        );
        assert_eq!(
            poll_interval("SITEWATCH_TEST_UC_INTERVAL_MS", 1000, MIN_FAST_POLL_MS),
            Duration::from_millis(200)
        );
        assert_eq!(
            poll_interval("SITEWATCH_TEST_UNSET_INTERVAL_MS", 1000, MIN_FAST_POLL_MS),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_env_flags() {
        std::env::set_var("SITEWATCH_TEST_FLAG_OFF", "false");
        std::env::set_var("SITEWATCH_TEST_FLAG_ON", " Yes ");
        assert!(!env_flag("SITEWATCH_TEST_FLAG_OFF", true));
        assert!(env_flag("SITEWATCH_TEST_FLAG_ON", false));
        assert!(env_flag("SITEWATCH_TEST_FLAG_UNSET", true));
        assert!(!env_flag("SITEWATCH_TEST_FLAG_UNSET", false));
    }

    #[test]
    fn test_disabled_detectors_are_skipped() {
        let detectors = EnabledDetectors {
            ppe: false,
            high_risk: false,
            ..EnabledDetectors::default()
        };
        assert_eq!(
            detectors.categories(),
            [DetectionCategory::Person, DetectionCategory::Uc]
        );
        assert_eq!(EnabledDetectors::default().categories(), DetectionCategory::ALL);
    }

    #[test]
    fn test_channels_without_dataset_root() {
        let config = ReplayConfig::default();
        let (channels, selected) = config.channels().unwrap();
        assert_eq!(channels, [PathBuf::from("./sequence")]);
        assert_eq!(selected, 0);
    }

    #[test]
    fn test_channels_select_default_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["north_gate", "South_Tower"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let config = ReplayConfig {
            dataset_root: Some(dir.path().to_path_buf()),
            default_sequence: Some("south_tower".to_string()),
            ..ReplayConfig::default()
        };

        let (channels, selected) = config.channels().unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels[selected].ends_with("South_Tower"));
    }

    #[test]
    fn test_missing_engine_config_uses_defaults() {
        let config = ReplayConfig::default();
        let engine = config.load_engine_config().unwrap();
        assert_eq!(engine.expected_people, 2);
    }

    #[test]
    fn test_unreadable_engine_config_fails() {
        let config = ReplayConfig {
            engine_config_path: Some(PathBuf::from("/nonexistent/sitewatch.json")),
            ..ReplayConfig::default()
        };
        assert!(config.load_engine_config().is_err());
    }
}
