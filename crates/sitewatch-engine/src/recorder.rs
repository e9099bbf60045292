//! Deduplicated audit trail of abnormal conditions.
//!
//! Independent of throttling: every abnormal condition is recorded even when
//! the alert counter suppresses it. Only exact (type, detail) repeats within
//! the dedup window are dropped; details embed live counts, so the window
//! catches same-tick repetition rather than long-run duplicates.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::metrics;
use sitewatch_models::{AlertCategory, ReportEvent};

/// Append-only event log with a short per-key dedup window.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    dedup_window: Duration,
    events: Vec<ReportEvent>,
    last_recorded: HashMap<(AlertCategory, String), DateTime<Utc>>,
}

impl EventRecorder {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            dedup_window,
            events: Vec::new(),
            last_recorded: HashMap::new(),
        }
    }

    /// Record a condition. Returns the appended event, or `None` when the
    /// same key was recorded less than the dedup window ago.
    pub fn record(
        &mut self,
        now: DateTime<Utc>,
        event_type: AlertCategory,
        detail: &str,
    ) -> Option<ReportEvent> {
        let key = (event_type, detail.to_string());

        if let Some(last) = self.last_recorded.get(&key) {
            if now - *last < self.dedup_window {
                debug!(event_type = %event_type, detail, "Duplicate event skipped");
                return None;
            }
        }

        let event = ReportEvent::new(now, event_type, detail);
        self.last_recorded.insert(key, now);
        self.events.push(event.clone());
        metrics::record_report_event(event_type);
        Some(event)
    }

    /// Events in insertion (tick) order.
    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.last_recorded.clear();
    }
}
