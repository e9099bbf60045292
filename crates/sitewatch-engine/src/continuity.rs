//! Continuity tracker policy for the person category.
//!
//! The person detector runs every second or so while frames tick at video
//! rate. A single-object visual tracker bridges the gap so the display keeps
//! a box on the main subject. The tracker itself is external; this module
//! owns the policy of when to init, update and reset it.
//!
//! # Per-tick decision
//! - Detector produced boxes: anchor on the largest one. Re-init when the
//!   tracker is inactive, no box is held, or the tick index hits the
//!   re-init cadence; otherwise update.
//! - Detector produced nothing: update only if the tracker is active.
//! - Consecutive update failures reaching the threshold force a reset and
//!   suppress output for that tick.
//!
//! Continuity boxes are a display aid only. They never feed people counts
//! or compliance.

use serde::Serialize;
use tracing::debug;

use crate::metrics;
use sitewatch_models::{BoundingBox, ContinuityBox};

/// Single-object visual tracker adapter.
pub trait ContinuityTracker: Send {
    /// True while the tracker holds a target.
    fn is_active(&self) -> bool;

    /// (Re)initialize on a fresh detector box.
    fn init(&mut self, anchor: BoundingBox);

    /// Advance one frame. `None` means the tracker lost the target.
    fn update(&mut self) -> Option<BoundingBox>;

    /// Drop the target.
    fn reset(&mut self);
}

/// Tracker that holds its last initialised box and reports it for a
/// limited number of coasting updates.
///
/// Used where no visual tracker is available: the box stays put between
/// detector hits and the tracker gives up after `max_coast` updates.
#[derive(Debug, Clone)]
pub struct CoastingTracker {
    max_coast: u32,
    current: Option<BoundingBox>,
    coasted: u32,
}

impl CoastingTracker {
    pub fn new(max_coast: u32) -> Self {
        Self {
            max_coast,
            current: None,
            coasted: 0,
        }
    }
}

impl ContinuityTracker for CoastingTracker {
    fn is_active(&self) -> bool {
        self.current.is_some()
    }

    fn init(&mut self, anchor: BoundingBox) {
        self.current = Some(anchor);
        self.coasted = 0;
    }

    fn update(&mut self) -> Option<BoundingBox> {
        let bbox = self.current?;
        if self.coasted >= self.max_coast {
            return None;
        }
        self.coasted += 1;
        Some(bbox)
    }

    fn reset(&mut self) {
        self.current = None;
        self.coasted = 0;
    }
}

/// Engine-owned view of the tracker lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackState {
    pub active: bool,
    pub last_box: Option<BoundingBox>,
    pub frames_since_detector_hit: u32,
    pub consecutive_update_failures: u32,
}

/// What the policy did with the tracker on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerAction {
    /// No tracker call (no detection, tracker inactive)
    Idle,
    /// Tracker initialised from a detector anchor
    Init,
    /// Tracker updated successfully
    Updated,
    /// Tracker update failed, below the reset threshold
    UpdateFailed,
    /// Failure threshold reached, tracker reset
    Reset,
}

/// Counters for monitoring tracker health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub inits: u64,
    pub updates: u64,
    pub update_failures: u64,
    pub resets: u64,
}

/// Init/update/reset policy around an external [`ContinuityTracker`].
#[derive(Debug, Clone)]
pub struct ContinuityPolicy {
    reinit_every: u64,
    max_failures: u32,
    state: TrackState,
    last_action: TrackerAction,
    stats: TrackerStats,
}

impl ContinuityPolicy {
    /// Create a policy. Zero cadence or threshold is treated as 1.
    pub fn new(reinit_every: u32, max_failures: u32) -> Self {
        Self {
            reinit_every: reinit_every.max(1) as u64,
            max_failures: max_failures.max(1),
            state: TrackState::default(),
            last_action: TrackerAction::Idle,
            stats: TrackerStats::default(),
        }
    }

    /// Run the per-tick decision and return the continuity box, if any.
    pub fn step<T: ContinuityTracker + ?Sized>(
        &mut self,
        tracker: &mut T,
        tick_index: u64,
        person_boxes: &[BoundingBox],
    ) -> Option<ContinuityBox> {
        match largest_box(person_boxes) {
            Some(anchor) => {
                self.state.frames_since_detector_hit = 0;

                let cadence_hit = tick_index % self.reinit_every == 0;
                if !tracker.is_active() || self.state.last_box.is_none() || cadence_hit {
                    tracker.init(anchor);
                    self.state.last_box = Some(anchor);
                    self.state.consecutive_update_failures = 0;
                    self.stats.inits += 1;
                    self.last_action = TrackerAction::Init;
                    metrics::record_tracker_init();
                    debug!(tick = tick_index, area = anchor.area(), "Tracker initialised");
                } else {
                    self.apply_update(tracker);
                }
            }
            None => {
                self.state.frames_since_detector_hit =
                    self.state.frames_since_detector_hit.saturating_add(1);

                if tracker.is_active() {
                    self.apply_update(tracker);
                } else {
                    self.last_action = TrackerAction::Idle;
                }
            }
        }

        if self.state.consecutive_update_failures >= self.max_failures {
            tracker.reset();
            self.state.last_box = None;
            self.state.consecutive_update_failures = 0;
            self.state.active = false;
            self.stats.resets += 1;
            self.last_action = TrackerAction::Reset;
            metrics::record_tracker_reset();
            debug!(tick = tick_index, "Tracker failure threshold reached, reset");
            return None;
        }

        self.state.active = tracker.is_active();
        if !self.state.active {
            return None;
        }

        self.state.last_box.map(|bbox| ContinuityBox {
            bbox,
            frames_since_detector_hit: self.state.frames_since_detector_hit,
        })
    }

    /// Reset tracker and policy state (channel switch).
    pub fn reset<T: ContinuityTracker + ?Sized>(&mut self, tracker: &mut T) {
        tracker.reset();
        self.state = TrackState::default();
        self.last_action = TrackerAction::Idle;
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn last_action(&self) -> TrackerAction {
        self.last_action
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    fn apply_update<T: ContinuityTracker + ?Sized>(&mut self, tracker: &mut T) {
        self.stats.updates += 1;
        match tracker.update() {
            Some(bbox) => {
                self.state.last_box = Some(bbox);
                self.state.consecutive_update_failures = 0;
                self.last_action = TrackerAction::Updated;
            }
            None => {
                self.state.consecutive_update_failures += 1;
                self.stats.update_failures += 1;
                self.last_action = TrackerAction::UpdateFailed;
            }
        }
    }
}

/// Maximum-area box, first one wins on ties.
fn largest_box(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    boxes.iter().copied().fold(None, |best, candidate| match best {
        Some(b) if b.area() >= candidate.area() => Some(b),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted tracker recording every call.
    #[derive(Default)]
    struct ScriptedTracker {
        active: bool,
        fail_updates: bool,
        calls: Vec<&'static str>,
        held: Option<BoundingBox>,
    }

    impl ContinuityTracker for ScriptedTracker {
        fn is_active(&self) -> bool {
            self.active
        }

        fn init(&mut self, anchor: BoundingBox) {
            self.active = true;
            self.held = Some(anchor);
            self.calls.push("init");
        }

        fn update(&mut self) -> Option<BoundingBox> {
            self.calls.push("update");
            if self.fail_updates {
                None
            } else {
                self.held
            }
        }

        fn reset(&mut self) {
            self.active = false;
            self.held = None;
            self.calls.push("reset");
        }
    }

    fn person_box() -> BoundingBox {
        BoundingBox::new(10.0, 10.0, 60.0, 110.0)
    }

    #[test]
    fn test_largest_box_selected_as_anchor() {
        let small = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let large = BoundingBox::new(100.0, 100.0, 200.0, 250.0);
        assert_eq!(largest_box(&[small, large, small]), Some(large));
        assert_eq!(largest_box(&[]), None);

        let mut policy = ContinuityPolicy::new(15, 5);
        let mut tracker = ScriptedTracker::default();
        let output = policy.step(&mut tracker, 0, &[small, large]).unwrap();
        assert_eq!(output.bbox, large);
    }

    #[test]
    fn test_reinit_cadence_with_continuous_detections() {
        let mut policy = ContinuityPolicy::new(15, 5);
        let mut tracker = ScriptedTracker::default();

        let mut init_ticks = Vec::new();
        for tick in 0..46u64 {
            policy.step(&mut tracker, tick, &[person_box()]);
            match policy.last_action() {
                TrackerAction::Init => init_ticks.push(tick),
                action => assert_eq!(action, TrackerAction::Updated, "tick {tick}"),
            }
        }

        assert_eq!(init_ticks, vec![0, 15, 30, 45]);
        assert_eq!(policy.stats().inits, 4);
        assert_eq!(policy.stats().updates, 42);
    }

    #[test]
    fn test_no_detection_never_reinitialises() {
        let mut policy = ContinuityPolicy::new(15, 5);
        let mut tracker = ScriptedTracker::default();

        // Inactive tracker, no detection: no calls at all.
        assert!(policy.step(&mut tracker, 0, &[]).is_none());
        assert!(tracker.calls.is_empty());
        assert_eq!(policy.last_action(), TrackerAction::Idle);

        policy.step(&mut tracker, 1, &[person_box()]);
        // Tick 15 is a cadence tick, but without a detection only update runs.
        let output = policy.step(&mut tracker, 15, &[]).unwrap();
        assert_eq!(tracker.calls, vec!["init", "update"]);
        assert_eq!(output.frames_since_detector_hit, 1);
    }

    #[test]
    fn test_failure_threshold_forces_reset() {
        let max_failures = 3;
        let mut policy = ContinuityPolicy::new(15, max_failures);
        let mut tracker = ScriptedTracker::default();

        assert!(policy.step(&mut tracker, 0, &[person_box()]).is_some());
        tracker.fail_updates = true;

        // Failures below the threshold keep showing the held box.
        for tick in 1..max_failures as u64 {
            let output = policy.step(&mut tracker, tick, &[]);
            assert_eq!(output.map(|c| c.bbox), Some(person_box()), "tick {tick}");
            assert_eq!(policy.state().consecutive_update_failures, tick as u32);
        }

        // The failure that reaches the threshold resets and emits nothing.
        let output = policy.step(&mut tracker, max_failures as u64, &[]);
        assert!(output.is_none());
        assert_eq!(policy.last_action(), TrackerAction::Reset);
        assert_eq!(tracker.calls.last(), Some(&"reset"));
        assert_eq!(policy.state().last_box, None);
        assert!(!policy.state().active);
        assert_eq!(policy.stats().resets, 1);

        // Inactive afterwards: nothing happens until a detection arrives.
        assert!(policy.step(&mut tracker, 4, &[]).is_none());
        assert_eq!(policy.last_action(), TrackerAction::Idle);
    }

    #[test]
    fn test_successful_update_clears_failures() {
        let mut policy = ContinuityPolicy::new(100, 3);
        let mut tracker = ScriptedTracker::default();
        policy.step(&mut tracker, 0, &[person_box()]);

        tracker.fail_updates = true;
        policy.step(&mut tracker, 1, &[]);
        policy.step(&mut tracker, 2, &[]);
        assert_eq!(policy.state().consecutive_update_failures, 2);

        tracker.fail_updates = false;
        policy.step(&mut tracker, 3, &[]);
        assert_eq!(policy.state().consecutive_update_failures, 0);
        assert_eq!(policy.last_action(), TrackerAction::Updated);
    }

    #[test]
    fn test_coasting_tracker_gives_up() {
        let mut tracker = CoastingTracker::new(2);
        assert!(!tracker.is_active());
        assert_eq!(tracker.update(), None);

        tracker.init(person_box());
        assert_eq!(tracker.update(), Some(person_box()));
        assert_eq!(tracker.update(), Some(person_box()));
        assert_eq!(tracker.update(), None);

        tracker.init(person_box());
        assert_eq!(tracker.update(), Some(person_box()));

        tracker.reset();
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_policy_with_coasting_tracker_self_heals() {
        let mut policy = ContinuityPolicy::new(15, 2);
        let mut tracker = CoastingTracker::new(1);

        assert!(policy.step(&mut tracker, 0, &[person_box()]).is_some());
        assert!(policy.step(&mut tracker, 1, &[]).is_some());
        assert!(policy.step(&mut tracker, 2, &[]).is_some());
        assert!(policy.step(&mut tracker, 3, &[]).is_none());
        assert!(!tracker.is_active());

        let output = policy.step(&mut tracker, 4, &[person_box()]).unwrap();
        assert_eq!(output.frames_since_detector_hit, 0);
        assert_eq!(policy.last_action(), TrackerAction::Init);
    }
}
