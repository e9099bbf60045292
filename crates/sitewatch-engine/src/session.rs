//! Session bracketing and report aggregation.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use sitewatch_models::{ReportEvent, SessionId, SessionReport, ThresholdSummary};

/// Running statistics for one monitoring session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub work_start: DateTime<Utc>,
    pub work_end: Option<DateTime<Utc>>,
    pub max_people_stable: u32,
    pub max_helmet_count: u32,
    pub max_harness_count: u32,
    pub total_abnormal_events: u64,
    /// Alert counter captured at stop
    pub total_alerts_at_stop: Option<u64>,
}

impl SessionStats {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::new(),
            work_start: now,
            work_end: None,
            max_people_stable: 0,
            max_helmet_count: 0,
            max_harness_count: 0,
            total_abnormal_events: 0,
            total_alerts_at_stop: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.work_end.is_none()
    }
}

/// Owns the current (or most recent) session.
///
/// Stop freezes the statistics; only a new start clears them.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    current: Option<SessionStats>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, discarding the previous one.
    pub fn start(&mut self, now: DateTime<Utc>) -> SessionId {
        let stats = SessionStats::new(now);
        let session_id = stats.session_id.clone();
        info!(session_id = %session_id, work_start = %now, "Session started");
        self.current = Some(stats);
        session_id
    }

    /// Close the open session, freezing the alert total. Returns false if
    /// none was open.
    pub fn stop(&mut self, now: DateTime<Utc>, total_alerts: u64) -> bool {
        match self.current.as_mut() {
            Some(stats) if stats.is_open() => {
                stats.work_end = Some(now);
                stats.total_alerts_at_stop = Some(total_alerts);
                info!(
                    session_id = %stats.session_id,
                    work_end = %now,
                    abnormal_events = stats.total_abnormal_events,
                    total_alerts,
                    "Session stopped"
                );
                true
            }
            _ => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.as_ref().is_some_and(SessionStats::is_open)
    }

    pub fn stats(&self) -> Option<&SessionStats> {
        self.current.as_ref()
    }

    /// Fold one tick's counts into the running maxima. Ignored unless open.
    pub fn observe(&mut self, people_stable: u32, helmet_count: u32, harness_count: u32) {
        if let Some(stats) = self.open_mut() {
            stats.max_people_stable = stats.max_people_stable.max(people_stable);
            stats.max_helmet_count = stats.max_helmet_count.max(helmet_count);
            stats.max_harness_count = stats.max_harness_count.max(harness_count);
        }
    }

    /// Count one recorded abnormal event. Ignored unless open.
    pub fn note_abnormal_event(&mut self) {
        if let Some(stats) = self.open_mut() {
            stats.total_abnormal_events += 1;
        }
    }

    /// Build the report. An open session uses `now` as an implicit end and
    /// the live alert total; a stopped one uses the values frozen at stop.
    pub fn export(
        &self,
        now: DateTime<Utc>,
        events: &[ReportEvent],
        total_alerts: u64,
        thresholds: ThresholdSummary,
    ) -> EngineResult<SessionReport> {
        let stats = self.current.as_ref().ok_or(EngineError::NothingToExport)?;
        let (work_end, implicit_end) = match stats.work_end {
            Some(end) => (end, false),
            None => (now, true),
        };

        Ok(SessionReport {
            session_id: stats.session_id.clone(),
            work_start: stats.work_start,
            work_end,
            implicit_end,
            thresholds,
            max_people_stable: stats.max_people_stable,
            max_helmet_count: stats.max_helmet_count,
            max_harness_count: stats.max_harness_count,
            total_abnormal_events: stats.total_abnormal_events,
            total_alerts: stats.total_alerts_at_stop.unwrap_or(total_alerts),
            events: events.to_vec(),
        })
    }

    fn open_mut(&mut self) -> Option<&mut SessionStats> {
        self.current.as_mut().filter(|stats| stats.is_open())
    }
}
