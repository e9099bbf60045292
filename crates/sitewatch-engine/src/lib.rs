//! Temporal fusion engine for workplace-safety monitoring.
//!
//! Turns noisy per-frame detections into a stable, throttled, auditable
//! alert stream:
//!
//! 1. **Stability Filter**: hold windows absorb detector flicker
//! 2. **Continuity Policy**: init/update/reset decisions for a person tracker
//! 3. **Compliance Evaluator**: abnormal flags and risk level
//! 4. **Alert Throttler**: per-category cooldowns on the alert counter
//! 5. **Event Recorder**: deduplicated audit trail
//! 6. **Session Aggregator**: running maxima and the exported report
//!
//! # Architecture
//!
//! ```text
//! Detector workers ──post──▶ DetectionInbox
//!                                │ take() per tick
//!                                ▼
//!                          SafetyEngine::tick(now, input)
//!     │
//!     ├──▶ RawSignals::collect ──▶ StabilityFilter ──▶ compliance::evaluate
//!     │                                                      │
//!     ├──▶ ContinuityPolicy (display only)                   ▼
//!     │                                              AlertThrottler
//!     │                                                      │
//!     │                                                      ▼
//!     └──────────────────────────────────────────▶ EventRecorder / SessionAggregator
//!                                                            │
//!                                                            ▼
//!                                                      SessionReport
//! ```

pub mod compliance;
pub mod config;
pub mod continuity;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod metrics;
pub mod recorder;
pub mod session;
pub mod stability;
pub mod throttle;

pub use config::EngineConfig;
pub use continuity::{CoastingTracker, ContinuityPolicy, ContinuityTracker, TrackState, TrackerAction};
pub use engine::{SafetyEngine, TickOutput};
pub use error::{EngineError, EngineResult};
pub use inbox::{DetectionInbox, TickInput};
pub use recorder::EventRecorder;
pub use session::{SessionAggregator, SessionStats};
pub use stability::{HoldSignal, RawSignals, StabilityFilter, StabilizedState};
pub use throttle::AlertThrottler;
