//! Compliance evaluation: stabilized state to abnormal flags.
//!
//! Pure function; no side effects, safe to call more than once per tick.

use crate::config::EngineConfig;
use crate::stability::StabilizedState;
use sitewatch_models::{AlertCategory, ComplianceSnapshot, PpeItem};

/// Evaluate the abnormal flags for a stabilized state.
///
/// Fewer people than expected is abnormal; more than expected is not.
pub fn evaluate(state: &StabilizedState, config: &EngineConfig) -> ComplianceSnapshot {
    let people = state.people_count;
    let present = people > 0;

    ComplianceSnapshot::from_flags(
        people < config.expected_people,
        present && !state.ppe_status(PpeItem::Helmet).is_compliant(),
        present && !state.ppe_status(PpeItem::Harness).is_compliant(),
        !state.unsafe_codes.is_empty(),
    )
}

/// Alert categories flagged abnormal in a snapshot, in evaluation order.
pub fn abnormal_categories(snapshot: &ComplianceSnapshot) -> Vec<AlertCategory> {
    AlertCategory::ALL
        .iter()
        .copied()
        .filter(|category| is_abnormal(snapshot, *category))
        .collect()
}

/// Flag for a single category.
pub fn is_abnormal(snapshot: &ComplianceSnapshot, category: AlertCategory) -> bool {
    match category {
        AlertCategory::PeopleMismatch => snapshot.people_abnormal,
        AlertCategory::HelmetMissing => snapshot.helmet_abnormal,
        AlertCategory::HarnessMissing => snapshot.harness_abnormal,
        AlertCategory::UnsafeInstall => snapshot.unsafe_abnormal,
    }
}
