//! Hold-window stabilization of raw per-tick signals.
//!
//! Detectors flicker: a person visible for seconds may be missed on a
//! handful of inference cycles. Each signal keeps its last positive
//! observation authoritative for a hold window `H`:
//!
//! ```text
//! observed ──●────────────────────────────●───────────────
//!            │<────── H ──────>│           │<────── H ...
//! stable   ──███████████████████░░░░░░░░░░███████████████
//!                       (elapsed ≤ H)  (> H: falsy)
//! ```
//!
//! The boundary is inclusive: at exactly `H` after the last observation the
//! value is still held.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::EngineConfig;
use crate::inbox::TickInput;
use sitewatch_models::{DetectionCategory, PpeItem, PpeStatus};

/// A single value held for a fixed window after its last observation.
#[derive(Debug, Clone)]
pub struct HoldSignal<T> {
    hold: Duration,
    last_seen_at: Option<DateTime<Utc>>,
    last_value: Option<T>,
}

impl<T> HoldSignal<T> {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            last_seen_at: None,
            last_value: None,
        }
    }

    /// Record a positive observation.
    pub fn observe(&mut self, now: DateTime<Utc>, value: T) {
        self.last_seen_at = Some(now);
        self.last_value = Some(value);
    }

    /// Held value, or `None` once more than the hold window has elapsed.
    pub fn current(&self, now: DateTime<Utc>) -> Option<&T> {
        match self.last_seen_at {
            Some(seen) if now - seen <= self.hold => self.last_value.as_ref(),
            _ => None,
        }
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    pub fn clear(&mut self) {
        self.last_seen_at = None;
        self.last_value = None;
    }
}

/// Raw signals extracted from one tick of detections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSignals {
    /// Person boxes meeting the confidence threshold
    pub people: u32,
    /// PPE boxes per item meeting the confidence threshold
    pub ppe_counts: BTreeMap<PpeItem, u32>,
    /// Allow-listed unsafe codes seen this tick
    pub unsafe_codes: BTreeSet<String>,
}

impl RawSignals {
    /// Extract raw signals, applying confidence thresholds and the
    /// unsafe-code allow-list.
    pub fn collect(input: &TickInput, config: &EngineConfig) -> Self {
        let people = input
            .detections(DetectionCategory::Person)
            .iter()
            .filter(|d| d.confidence >= config.person_min_confidence)
            .count() as u32;

        let mut ppe_counts: BTreeMap<PpeItem, u32> =
            PpeItem::ALL.iter().map(|item| (*item, 0)).collect();
        for detection in input.detections(DetectionCategory::Ppe) {
            if detection.confidence < config.ppe_min_confidence {
                continue;
            }
            if let Some(item) = config.ppe_item_for_label(&detection.class_label) {
                *ppe_counts.entry(item).or_insert(0) += 1;
            }
        }

        let unsafe_codes = DetectionCategory::ALL
            .iter()
            .filter(|category| category.carries_unsafe_codes())
            .flat_map(|category| input.detections(*category))
            .filter(|d| d.confidence >= config.unsafe_min_confidence)
            .filter(|d| config.unsafe_display_name(&d.class_label).is_some())
            .map(|d| d.class_label.clone())
            .collect();

        Self {
            people,
            ppe_counts,
            unsafe_codes,
        }
    }

    pub fn ppe_count(&self, item: PpeItem) -> u32 {
        self.ppe_counts.get(&item).copied().unwrap_or(0)
    }
}

/// Stabilized view of the site, recomputed every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StabilizedState {
    pub people_count: u32,
    pub people_last_seen_at: Option<DateTime<Utc>>,
    pub ppe: BTreeMap<PpeItem, PpeStatus>,
    pub ppe_last_ok_at: BTreeMap<PpeItem, DateTime<Utc>>,
    pub unsafe_codes: BTreeSet<String>,
    pub unsafe_last_seen_at: Option<DateTime<Utc>>,
}

impl StabilizedState {
    pub fn ppe_status(&self, item: PpeItem) -> PpeStatus {
        self.ppe.get(&item).copied().unwrap_or_default()
    }
}

/// Hold-window filter for people count, per-item PPE compliance and the
/// unsafe-code set.
#[derive(Debug, Clone)]
pub struct StabilityFilter {
    people: HoldSignal<u32>,
    ppe: BTreeMap<PpeItem, HoldSignal<()>>,
    unsafe_codes: HoldSignal<BTreeSet<String>>,
}

impl StabilityFilter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            people: HoldSignal::new(config.people_hold()),
            ppe: PpeItem::ALL
                .iter()
                .map(|item| (*item, HoldSignal::new(config.ppe_hold())))
                .collect(),
            unsafe_codes: HoldSignal::new(config.unsafe_hold()),
        }
    }

    /// Fold one tick of raw signals into the held state.
    pub fn update(&mut self, now: DateTime<Utc>, raw: &RawSignals) -> StabilizedState {
        if raw.people > 0 {
            self.people.observe(now, raw.people);
        }
        let people_count = self.people.current(now).copied().unwrap_or(0);

        // PPE compliance is only evaluated while someone is stably present.
        let mut ppe = BTreeMap::new();
        for (item, signal) in self.ppe.iter_mut() {
            let status = if people_count == 0 {
                PpeStatus::NotApplicable
            } else {
                if raw.ppe_count(*item) >= people_count {
                    signal.observe(now, ());
                }
                if signal.current(now).is_some() {
                    PpeStatus::Compliant
                } else {
                    PpeStatus::Missing
                }
            };
            ppe.insert(*item, status);
        }

        // Any hit replaces the held set wholesale; empty ticks never clear it.
        if !raw.unsafe_codes.is_empty() {
            self.unsafe_codes.observe(now, raw.unsafe_codes.clone());
        }
        let unsafe_codes = self.unsafe_codes.current(now).cloned().unwrap_or_default();

        StabilizedState {
            people_count,
            people_last_seen_at: self.people.last_seen_at(),
            ppe,
            ppe_last_ok_at: self
                .ppe
                .iter()
                .filter_map(|(item, signal)| signal.last_seen_at().map(|t| (*item, t)))
                .collect(),
            unsafe_codes,
            unsafe_last_seen_at: self.unsafe_codes.last_seen_at(),
        }
    }

    /// Forget all held observations (channel or session switch).
    pub fn clear(&mut self) {
        self.people.clear();
        for signal in self.ppe.values_mut() {
            signal.clear();
        }
        self.unsafe_codes.clear();
    }
}
