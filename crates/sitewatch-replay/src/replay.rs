//! Frame ticker and per-category detector pollers.
//!
//! ```text
//!  person poller ─┐
//!  ppe poller    ─┼─ post ─▶ DetectionInbox ─ take ─▶ frame ticker ─▶ SafetyEngine
//!  uc poller     ─┤                 ▲                     │
//!  hr poller     ─┘                 └──── playhead ◀──────┘
//! ```
//!
//! Pollers read the frame under the shared playhead at their own cadence;
//! the ticker advances the playhead at the playback rate. A channel switch
//! swaps the playhead's sequence and drops anything loaded from the old one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use sitewatch_engine::{CoastingTracker, DetectionInbox, EngineConfig, SafetyEngine, TickOutput};
use sitewatch_models::{Detection, DetectionCategory, SessionReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{PredictionFolders, ReplayConfig};
use crate::error::{ReplayError, ReplayResult};
use crate::labels::LabelResolver;
use crate::metrics;
use crate::sequence::{channel_name, FrameSequence};

#[derive(Debug)]
struct Position {
    sequence: Arc<FrameSequence>,
    frame: usize,
    /// Bumped on every sequence swap
    generation: u64,
}

/// Sequence and frame under playback, shared by the ticker and pollers.
#[derive(Debug)]
struct Playhead {
    position: RwLock<Position>,
}

impl Playhead {
    fn new(sequence: FrameSequence) -> Self {
        Self {
            position: RwLock::new(Position {
                sequence: Arc::new(sequence),
                frame: 0,
                generation: 0,
            }),
        }
    }

    fn snapshot(&self) -> (Arc<FrameSequence>, usize, u64) {
        let position = self.read();
        (Arc::clone(&position.sequence), position.frame, position.generation)
    }

    fn frame(&self) -> usize {
        self.read().frame
    }

    fn len(&self) -> usize {
        self.read().sequence.len()
    }

    fn seek(&self, frame: usize) {
        self.write().frame = frame;
    }

    /// Swap in a new sequence at frame 0 and discard undelivered batches.
    fn load(&self, sequence: FrameSequence, inbox: &DetectionInbox) {
        let mut position = self.write();
        position.sequence = Arc::new(sequence);
        position.frame = 0;
        position.generation += 1;
        inbox.take();
    }

    /// Post a batch unless the sequence it was loaded from has been swapped out.
    fn post_if_current(
        &self,
        generation: u64,
        inbox: &DetectionInbox,
        category: DetectionCategory,
        detections: Vec<Detection>,
    ) -> bool {
        let position = self.read();
        if position.generation != generation {
            return false;
        }
        inbox.post(category, detections);
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, Position> {
        self.position.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Position> {
        self.position.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One detector family polling prediction files into the inbox.
#[derive(Clone)]
pub struct DetectorPoller {
    category: DetectionCategory,
    interval: Duration,
    playhead: Arc<Playhead>,
    folders: Arc<PredictionFolders>,
    resolver: Arc<LabelResolver>,
    inbox: DetectionInbox,
}

impl DetectorPoller {
    pub fn category(&self) -> DetectionCategory {
        self.category
    }

    /// Load the current frame's predictions and post them. Returns the
    /// number of detections posted.
    pub fn poll_once(&self) -> ReplayResult<usize> {
        let (sequence, frame_index, generation) = self.playhead.snapshot();
        let started = Instant::now();
        let result =
            sequence.load_detections(frame_index, self.category, &self.folders, &self.resolver);
        metrics::record_detector_load(self.category, started.elapsed(), result.is_ok());

        let detections = result?;
        let count = detections.len();
        if !self
            .playhead
            .post_if_current(generation, &self.inbox, self.category, detections)
        {
            debug!(category = %self.category, "Dropped poll from previous channel");
            return Ok(0);
        }
        Ok(count)
    }

    /// Poll until shutdown. A load that outlasts the interval skips the
    /// cycles it overlaps instead of queueing them.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let poller = self.clone();
                    match tokio::task::spawn_blocking(move || poller.poll_once()).await {
                        Ok(Ok(count)) => {
                            debug!(category = %self.category, detections = count, "Detector poll");
                        }
                        Ok(Err(e)) => {
                            warn!(category = %self.category, "Detector poll failed: {}", e);
                        }
                        Err(e) => {
                            warn!(category = %self.category, "Detector poll task failed: {}", e);
                        }
                    }
                }
            }
        }

        debug!(category = %self.category, "Detector poller stopped");
    }
}

/// Result of one frame tick.
#[derive(Debug, Clone)]
pub struct FrameStep {
    pub frame_index: usize,
    pub output: TickOutput,
    /// True when playback reached the last frame and has nothing to continue with
    pub finished: bool,
}

/// Drives a [`SafetyEngine`] over one or more frame sequences.
pub struct ReplayDriver {
    config: ReplayConfig,
    channels: Vec<PathBuf>,
    channel_index: usize,
    playhead: Arc<Playhead>,
    folders: Arc<PredictionFolders>,
    resolver: Arc<LabelResolver>,
    inbox: DetectionInbox,
    engine: SafetyEngine<CoastingTracker>,
}

impl ReplayDriver {
    pub fn new(config: ReplayConfig, engine_config: EngineConfig) -> ReplayResult<Self> {
        let (channels, channel_index) = config.channels()?;
        let root = channels
            .get(channel_index)
            .ok_or_else(|| ReplayError::config_error("no channel selected"))?;
        let sequence = FrameSequence::discover(root)?;
        info!(
            sequence = %root.display(),
            channels = channels.len(),
            frames = sequence.len(),
            fps = config.fps,
            "Replay sequence loaded"
        );

        let tracker = CoastingTracker::new(config.tracker_max_coast);
        Ok(Self {
            folders: Arc::new(config.pred_folders.clone()),
            playhead: Arc::new(Playhead::new(sequence)),
            resolver: Arc::new(LabelResolver::default()),
            inbox: DetectionInbox::new(),
            engine: SafetyEngine::new(engine_config, tracker),
            channels,
            channel_index,
            config,
        })
    }

    /// Replace the class-id maps used by every poller.
    pub fn with_resolver(mut self, resolver: LabelResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn poller(&self, category: DetectionCategory) -> DetectorPoller {
        DetectorPoller {
            category,
            interval: self.config.poll_interval(category),
            playhead: Arc::clone(&self.playhead),
            folders: Arc::clone(&self.folders),
            resolver: Arc::clone(&self.resolver),
            inbox: self.inbox.clone(),
        }
    }

    /// Detector families that poll during [`ReplayDriver::run`].
    pub fn enabled_categories(&self) -> Vec<DetectionCategory> {
        self.config.detectors.categories()
    }

    pub fn channels(&self) -> &[PathBuf] {
        &self.channels
    }

    pub fn channel_index(&self) -> usize {
        self.channel_index
    }

    pub fn frame_index(&self) -> usize {
        self.playhead.frame()
    }

    pub fn frame_count(&self) -> usize {
        self.playhead.len()
    }

    pub fn engine(&self) -> &SafetyEngine<CoastingTracker> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SafetyEngine<CoastingTracker> {
        &mut self.engine
    }

    /// Move playback to another channel at its first frame.
    ///
    /// Pending and in-flight detections of the old channel are dropped and
    /// the engine's per-channel state is reset; the session stays open.
    pub fn switch_channel(&mut self, index: usize) -> ReplayResult<()> {
        let root = self.channels.get(index).ok_or_else(|| {
            ReplayError::config_error(format!(
                "channel index {} out of range ({} channels)",
                index,
                self.channels.len()
            ))
        })?;
        let sequence = FrameSequence::discover(root)?;
        let frames = sequence.len();

        self.playhead.load(sequence, &self.inbox);
        self.engine.switch_channel();
        self.channel_index = index;

        info!(channel = %channel_name(root), frames, "Switched channel");
        Ok(())
    }

    /// Tick the engine on the current frame with whatever the pollers have
    /// posted since the last tick, then advance the playhead.
    pub fn step(&mut self, now: chrono::DateTime<Utc>) -> FrameStep {
        let frame_index = self.frame_index();
        let output = self.engine.tick(now, self.inbox.take());
        metrics::record_frame();

        let next = frame_index + 1;
        let finished = if next < self.frame_count() {
            self.playhead.seek(next);
            false
        } else if let Some(channel) = self.next_channel() {
            match self.switch_channel(channel) {
                Ok(()) => false,
                Err(e) => {
                    warn!(channel, "Channel switch failed: {}", e);
                    true
                }
            }
        } else if self.config.loop_playback {
            self.playhead.seek(0);
            debug!("Sequence wrapped to first frame");
            false
        } else {
            true
        };

        FrameStep {
            frame_index,
            output,
            finished,
        }
    }

    /// Channel to continue with once the current sequence ends.
    fn next_channel(&self) -> Option<usize> {
        if !self.config.play_all_channels || self.channels.len() < 2 {
            return None;
        }
        let next = self.channel_index + 1;
        if next < self.channels.len() {
            Some(next)
        } else if self.config.loop_playback {
            Some(0)
        } else {
            None
        }
    }

    /// Play the sequence in real time until it ends or Ctrl-C, then export
    /// and write the session report.
    pub async fn run(mut self) -> ReplayResult<SessionReport> {
        let (shutdown_tx, _) = watch::channel(false);
        let session_id = self.engine.start_session(Utc::now());
        info!(session_id = %session_id, "Monitoring started");

        let categories = self.enabled_categories();
        if categories.is_empty() {
            warn!("All detectors disabled; ticks see no detections");
        }
        let pollers: Vec<JoinHandle<()>> = categories
            .into_iter()
            .map(|category| tokio::spawn(self.poller(category).run(shutdown_tx.subscribe())))
            .collect();

        let mut ticker = interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let step = self.step(Utc::now());
                    if step.finished {
                        info!(frames = step.frame_index + 1, "Reached end of sequence");
                        break;
                    }
                }
            }
        }

        let _ = shutdown_tx.send(true);
        for poller in pollers {
            if let Err(e) = poller.await {
                warn!("Detector poller join failed: {}", e);
            }
        }

        let now = Utc::now();
        self.engine.stop_session(now);
        let report = self.engine.export_report(now)?;
        write_report(&report, &self.config.report_path).await?;
        Ok(report)
    }
}

/// Write a report as pretty JSON, creating parent directories.
pub async fn write_report(report: &SessionReport, path: &Path) -> ReplayResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;

    info!(
        path = %path.display(),
        events = report.events.len(),
        total_alerts = report.total_alerts,
        "Session report written"
    );
    Ok(())
}
