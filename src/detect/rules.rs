//! Deterministic brute-force rule.

use crate::detect::features::FeatureRecord;

/// Flag records whose rolling fail count meets the threshold.
///
/// A hard cutoff over the trailing window -- no smoothing, no hysteresis.
/// Lowering the threshold can only add flags, never remove them.
pub fn apply_rules(features: &[FeatureRecord], fail_threshold: u32) -> Vec<bool> {
    features
        .iter()
        .map(|f| f.win_fails >= fail_threshold as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::features::sliding_window_features;
    use crate::ingest::{AuthEvent, EventKind, Outcome};
    use chrono::{TimeZone, Utc};

    fn fail_burst(count: usize) -> Vec<AuthEvent> {
        (0..count)
            .map(|i| AuthEvent {
                timestamp: Utc
                    .with_ymd_and_hms(2025, 9, 20, 10, 0, i as u32 % 60)
                    .unwrap(),
                src_ip: "10.0.0.1".to_string(),
                user: "root".to_string(),
                event: EventKind::Auth,
                status: Outcome::Fail,
                port: "22".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_threshold_cutoff() {
        let features = sliding_window_features(&fail_burst(12), 5);
        assert_eq!(apply_rules(&features, 10), vec![true]);
        assert_eq!(apply_rules(&features, 13), vec![false]);
        // exact boundary counts as a hit
        assert_eq!(apply_rules(&features, 12), vec![true]);
    }

    #[test]
    fn test_monotonic_in_threshold() {
        let mut events = fail_burst(8);
        events.extend(fail_burst(3).into_iter().map(|mut e| {
            e.src_ip = "10.0.0.2".to_string();
            e
        }));
        let features = sliding_window_features(&events, 5);

        let mut prev_hits = usize::MAX;
        for threshold in 1..=10u32 {
            let hits = apply_rules(&features, threshold)
                .iter()
                .filter(|f| **f)
                .count();
            assert!(hits <= prev_hits, "flags must not grow as threshold rises");
            prev_hits = hits;
        }
    }
}
