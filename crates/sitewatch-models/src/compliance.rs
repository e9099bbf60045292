//! Compliance evaluation output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stabilized PPE compliance of a single item.
///
/// `NotApplicable` is reported while nobody is stably present, and must not
/// be confused with `Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PpeStatus {
    #[default]
    NotApplicable,
    Compliant,
    Missing,
}

impl PpeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PpeStatus::NotApplicable => "n/a",
            PpeStatus::Compliant => "ok",
            PpeStatus::Missing => "missing",
        }
    }

    pub fn is_compliant(&self) -> bool {
        matches!(self, PpeStatus::Compliant)
    }
}

impl fmt::Display for PpeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate risk derived from the number of abnormal flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Normal,
    Caution,
    Danger,
}

impl RiskLevel {
    /// Normal for 0 abnormal flags, Caution for 1, Danger for 2 or more.
    pub fn from_abnormal_count(count: u32) -> Self {
        match count {
            0 => RiskLevel::Normal,
            1 => RiskLevel::Caution,
            _ => RiskLevel::Danger,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Caution => "caution",
            RiskLevel::Danger => "danger",
        }
    }

    /// Numeric level for gauges (0, 1, 2).
    pub fn as_level(&self) -> u8 {
        match self {
            RiskLevel::Normal => 0,
            RiskLevel::Caution => 1,
            RiskLevel::Danger => 2,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abnormal flags and risk level for one tick. Recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ComplianceSnapshot {
    pub people_abnormal: bool,
    pub helmet_abnormal: bool,
    pub harness_abnormal: bool,
    pub unsafe_abnormal: bool,
    pub abnormal_count: u32,
    pub risk_level: RiskLevel,
}

impl ComplianceSnapshot {
    /// Build a snapshot from the four flags, deriving count and risk level.
    pub fn from_flags(
        people_abnormal: bool,
        helmet_abnormal: bool,
        harness_abnormal: bool,
        unsafe_abnormal: bool,
    ) -> Self {
        let abnormal_count = [people_abnormal, helmet_abnormal, harness_abnormal, unsafe_abnormal]
            .iter()
            .filter(|flag| **flag)
            .count() as u32;

        Self {
            people_abnormal,
            helmet_abnormal,
            harness_abnormal,
            unsafe_abnormal,
            abnormal_count,
            risk_level: RiskLevel::from_abnormal_count(abnormal_count),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.abnormal_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_abnormal_count(0), RiskLevel::Normal);
        assert_eq!(RiskLevel::from_abnormal_count(1), RiskLevel::Caution);
        assert_eq!(RiskLevel::from_abnormal_count(2), RiskLevel::Danger);
        assert_eq!(RiskLevel::from_abnormal_count(4), RiskLevel::Danger);
    }

    #[test]
    fn test_snapshot_from_flags() {
        let snapshot = ComplianceSnapshot::from_flags(true, false, true, false);
        assert_eq!(snapshot.abnormal_count, 2);
        assert_eq!(snapshot.risk_level, RiskLevel::Danger);
        assert!(!snapshot.is_normal());

        assert!(ComplianceSnapshot::from_flags(false, false, false, false).is_normal());
    }
}
