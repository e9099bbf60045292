//! Per-category alert cooldowns.
//!
//! Sustained abnormal conditions would otherwise bump the alert counter on
//! every tick. Each category has an independent cooldown: the first abnormal
//! tick always fires, later ticks fire only once the cooldown has fully
//! elapsed since that category's previous fire.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::compliance::abnormal_categories;
use crate::config::EngineConfig;
use crate::metrics;
use sitewatch_models::{AlertCategory, ComplianceSnapshot};

/// Cooldown gate in front of the monotonically increasing alert counter.
#[derive(Debug, Clone)]
pub struct AlertThrottler {
    cooldowns: BTreeMap<AlertCategory, Duration>,
    last_fired: BTreeMap<AlertCategory, DateTime<Utc>>,
    alert_count: u64,
}

impl AlertThrottler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cooldowns: AlertCategory::ALL
                .iter()
                .map(|category| (*category, config.cooldown(*category)))
                .collect(),
            last_fired: BTreeMap::new(),
            alert_count: 0,
        }
    }

    /// Offer one abnormal observation. Returns true if it was counted.
    pub fn offer(&mut self, category: AlertCategory, now: DateTime<Utc>) -> bool {
        let cooldown = self.cooldown(category);

        if let Some(last) = self.last_fired.get(&category) {
            let elapsed = now - *last;
            if elapsed < cooldown {
                metrics::record_suppressed_alert(category);
                debug!(
                    category = %category,
                    elapsed_ms = elapsed.num_milliseconds(),
                    cooldown_ms = cooldown.num_milliseconds(),
                    "Alert suppressed by cooldown"
                );
                return false;
            }
        }

        self.alert_count += 1;
        self.last_fired.insert(category, now);
        metrics::record_alert(category);
        info!(category = %category, alert_count = self.alert_count, "Alert fired");
        true
    }

    /// Offer every abnormal category of a snapshot. Categories fire
    /// independently; returns those counted this tick.
    pub fn process(&mut self, now: DateTime<Utc>, snapshot: &ComplianceSnapshot) -> Vec<AlertCategory> {
        abnormal_categories(snapshot)
            .into_iter()
            .filter(|category| self.offer(*category, now))
            .collect()
    }

    pub fn alert_count(&self) -> u64 {
        self.alert_count
    }

    pub fn last_fired(&self, category: AlertCategory) -> Option<DateTime<Utc>> {
        self.last_fired.get(&category).copied()
    }

    pub fn cooldown(&self, category: AlertCategory) -> Duration {
        self.cooldowns
            .get(&category)
            .copied()
            .unwrap_or_else(Duration::zero)
    }

    /// Clear the counter and every cooldown (session start).
    pub fn reset(&mut self) {
        self.last_fired.clear();
        self.alert_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_first_abnormal_fires_immediately() {
        let mut throttler = AlertThrottler::new(&EngineConfig::default());
        assert!(throttler.offer(AlertCategory::UnsafeInstall, t0()));
        assert_eq!(throttler.alert_count(), 1);
        assert_eq!(throttler.last_fired(AlertCategory::UnsafeInstall), Some(t0()));
    }

    #[test]
    fn test_sustained_abnormal_over_two_cooldowns() {
        let config = EngineConfig::default();
        for category in AlertCategory::ALL {
            let mut throttler = AlertThrottler::new(&config);
            let window = config.cooldown(*category).num_milliseconds() * 2;

            let mut fired = 0;
            let mut t = 0;
            while t < window {
                if throttler.offer(*category, at_ms(t)) {
                    fired += 1;
                }
                t += 100;
            }

            assert_eq!(fired, 2, "{category}");
            assert_eq!(throttler.alert_count(), 2);
        }
    }

    #[test]
    fn test_cooldown_boundary_fires_at_exact_elapsed() {
        let mut throttler = AlertThrottler::new(&EngineConfig::default());
        assert!(throttler.offer(AlertCategory::PeopleMismatch, t0()));
        assert!(!throttler.offer(AlertCategory::PeopleMismatch, at_ms(9_999)));
        assert!(throttler.offer(AlertCategory::PeopleMismatch, at_ms(10_000)));
    }

    #[test]
    fn test_categories_fire_independently_on_same_tick() {
        let mut throttler = AlertThrottler::new(&EngineConfig::default());
        let snapshot = ComplianceSnapshot::from_flags(true, true, false, true);

        let fired = throttler.process(t0(), &snapshot);
        assert_eq!(
            fired,
            vec![
                AlertCategory::PeopleMismatch,
                AlertCategory::HelmetMissing,
                AlertCategory::UnsafeInstall
            ]
        );
        assert_eq!(throttler.alert_count(), 3);

        // People cooldown (10s) elapses before helmet (20s).
        let fired = throttler.process(at_ms(10_000), &snapshot);
        assert_eq!(fired, vec![AlertCategory::PeopleMismatch]);
        assert_eq!(throttler.alert_count(), 4);
    }

    #[test]
    fn test_reset_rearms_categories() {
        let mut throttler = AlertThrottler::new(&EngineConfig::default());
        throttler.offer(AlertCategory::HarnessMissing, t0());
        throttler.reset();

        assert_eq!(throttler.alert_count(), 0);
        assert!(throttler.offer(AlertCategory::HarnessMissing, at_ms(1)));
    }
}
