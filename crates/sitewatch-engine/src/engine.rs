//! The tick pipeline tying every stage together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::compliance::{self, abnormal_categories};
use crate::config::EngineConfig;
use crate::continuity::{ContinuityPolicy, ContinuityTracker};
use crate::error::EngineResult;
use crate::inbox::TickInput;
use crate::metrics;
use crate::recorder::EventRecorder;
use crate::session::{SessionAggregator, SessionStats};
use crate::stability::{RawSignals, StabilityFilter, StabilizedState};
use crate::throttle::AlertThrottler;
use sitewatch_models::{
    AlertCategory, BoundingBox, ComplianceSnapshot, ContinuityBox, DetectionCategory, PpeItem,
    ReportEvent, SessionId, SessionReport,
};

/// Everything a presentation layer needs after one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutput {
    pub tick_index: u64,
    pub snapshot: ComplianceSnapshot,
    pub stabilized: StabilizedState,
    pub continuity_box: Option<ContinuityBox>,
    /// Global alert counter after this tick
    pub alert_count: u64,
    /// Categories counted this tick
    pub fired: Vec<AlertCategory>,
    /// Events appended to the audit trail this tick
    pub recorded: Vec<ReportEvent>,
    /// Last alert line emitted this tick
    pub log_line: Option<String>,
}

/// Temporal fusion engine for one camera channel.
///
/// Not reentrant across ticks: the host calls [`SafetyEngine::tick`] from a
/// single timeline and feeds it atomic per-tick snapshots.
pub struct SafetyEngine<T: ContinuityTracker> {
    config: EngineConfig,
    tracker: T,
    tick_index: u64,
    stability: StabilityFilter,
    continuity: ContinuityPolicy,
    throttler: AlertThrottler,
    recorder: EventRecorder,
    session: SessionAggregator,
    last_log_line: Option<String>,
}

impl<T: ContinuityTracker> SafetyEngine<T> {
    pub fn new(config: EngineConfig, tracker: T) -> Self {
        Self {
            stability: StabilityFilter::new(&config),
            continuity: ContinuityPolicy::new(
                config.tracker_reinit_every,
                config.tracker_max_failures,
            ),
            throttler: AlertThrottler::new(&config),
            recorder: EventRecorder::new(config.event_dedup_window()),
            session: SessionAggregator::new(),
            tick_index: 0,
            last_log_line: None,
            config,
            tracker,
        }
    }

    /// Process one tick.
    ///
    /// Stages run in data-flow order: raw extraction, continuity tracking,
    /// stabilization, compliance, throttling, recording, session maxima.
    pub fn tick(&mut self, now: DateTime<Utc>, input: TickInput) -> TickOutput {
        let tick_index = self.tick_index;
        let raw = RawSignals::collect(&input, &self.config);

        // Continuity is display-only; it never feeds the people count.
        let person_boxes: Vec<BoundingBox> = input
            .detections(DetectionCategory::Person)
            .iter()
            .filter(|d| d.confidence >= self.config.person_min_confidence)
            .map(|d| d.bbox)
            .collect();
        let continuity_box = self.continuity.step(&mut self.tracker, tick_index, &person_boxes);

        let stabilized = self.stability.update(now, &raw);
        let snapshot = compliance::evaluate(&stabilized, &self.config);

        let fired = self.throttler.process(now, &snapshot);
        let mut log_line = None;
        let first_number = self.throttler.alert_count() + 1 - fired.len() as u64;
        for (offset, category) in fired.iter().enumerate() {
            let line = format!(
                "[{}] ALERT #{} {} ({})",
                now.format("%H:%M:%S"),
                first_number + offset as u64,
                category.label(),
                self.detail(*category, &stabilized, &raw)
            );
            info!(tick = tick_index, "{}", line);
            log_line = Some(line);
        }
        if log_line.is_some() {
            self.last_log_line.clone_from(&log_line);
        }

        let mut recorded = Vec::new();
        if self.session.is_open() {
            for category in abnormal_categories(&snapshot) {
                let detail = self.detail(category, &stabilized, &raw);
                if let Some(event) = self.recorder.record(now, category, &detail) {
                    self.session.note_abnormal_event();
                    recorded.push(event);
                }
            }
            self.session.observe(
                stabilized.people_count,
                raw.ppe_count(PpeItem::Helmet),
                raw.ppe_count(PpeItem::Harness),
            );
        }

        metrics::record_tick(snapshot.risk_level);
        self.tick_index += 1;

        TickOutput {
            tick_index,
            snapshot,
            stabilized,
            continuity_box,
            alert_count: self.throttler.alert_count(),
            fired,
            recorded,
            log_line,
        }
    }

    /// Open a session: clears the event log, counters and held state.
    pub fn start_session(&mut self, now: DateTime<Utc>) -> SessionId {
        self.recorder.clear();
        self.throttler.reset();
        self.stability.clear();
        self.last_log_line = None;
        self.session.start(now)
    }

    /// Freeze the session. State is kept until the next start.
    pub fn stop_session(&mut self, now: DateTime<Utc>) -> bool {
        self.session.stop(now, self.throttler.alert_count())
    }

    /// Export the current or most recent session.
    pub fn export_report(&self, now: DateTime<Utc>) -> EngineResult<SessionReport> {
        let report = self.session.export(
            now,
            self.recorder.events(),
            self.throttler.alert_count(),
            self.config.threshold_summary(),
        )?;
        info!(
            session_id = %report.session_id,
            events = report.events.len(),
            total_alerts = report.total_alerts,
            implicit_end = report.implicit_end,
            "Session report exported"
        );
        Ok(report)
    }

    /// Reset held and tracker state for a new video source. The session
    /// and its counters are left alone.
    pub fn switch_channel(&mut self) {
        self.stability.clear();
        self.continuity.reset(&mut self.tracker);
        self.tick_index = 0;
        debug!("Channel switched, stabilized state reset");
    }

    pub fn alert_count(&self) -> u64 {
        self.throttler.alert_count()
    }

    pub fn last_log_line(&self) -> Option<&str> {
        self.last_log_line.as_deref()
    }

    pub fn is_session_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn session_stats(&self) -> Option<&SessionStats> {
        self.session.stats()
    }

    pub fn events(&self) -> &[ReportEvent] {
        self.recorder.events()
    }

    pub fn continuity(&self) -> &ContinuityPolicy {
        &self.continuity
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Detail string with the live counts for a category.
    fn detail(&self, category: AlertCategory, state: &StabilizedState, raw: &RawSignals) -> String {
        match category {
            AlertCategory::PeopleMismatch => {
                format!("people {}/{}", state.people_count, self.config.expected_people)
            }
            AlertCategory::HelmetMissing => {
                format!("helmet {}/{}", raw.ppe_count(PpeItem::Helmet), state.people_count)
            }
            AlertCategory::HarnessMissing => {
                format!("harness {}/{}", raw.ppe_count(PpeItem::Harness), state.people_count)
            }
            AlertCategory::UnsafeInstall => state
                .unsafe_codes
                .iter()
                .map(|code| match self.config.unsafe_display_name(code) {
                    Some(name) => format!("{} ({})", code, name),
                    None => code.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
