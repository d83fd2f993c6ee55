//! Sliding-window feature extraction over authentication events.

use crate::ingest::{AuthEvent, EventKind, Outcome};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Per-(src_ip, minute) feature record with trailing rolling totals.
///
/// The `win_*` fields sum the per-minute base counts over the trailing
/// window; partial windows at the start of a source's history are kept.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord {
    pub src_ip: String,
    pub minute: DateTime<Utc>,

    // per-minute base counts
    pub total: u64,
    pub fails: u64,
    pub successes: u64,
    pub users: u64,
    pub ports: u64,

    // trailing rolling sums
    pub win_total: u64,
    pub win_fails: u64,
    pub win_successes: u64,
    pub win_users: u64,
    pub win_ports: u64,

    pub fail_rate: f64,
    pub avg_interval_sec: f64,
}

impl FeatureRecord {
    /// Numeric columns fed to the outlier model. Non-finite values fill to 0.
    pub fn feature_vector(&self) -> Vec<f64> {
        [
            self.win_total as f64,
            self.win_fails as f64,
            self.win_successes as f64,
            self.win_users as f64,
            self.win_ports as f64,
            self.fail_rate,
            self.avg_interval_sec,
        ]
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect()
    }
}

/// Truncate a timestamp to its minute bucket.
pub fn minute_floor(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp() - ts.timestamp().rem_euclid(60);
    Utc.timestamp_opt(secs, 0).single().unwrap_or(ts)
}

#[derive(Default)]
struct MinuteBucket {
    total: u64,
    fails: u64,
    successes: u64,
    users: HashSet<String>,
    ports: HashSet<String>,
}

/// Aggregate auth events into per-minute buckets per source and compute
/// trailing rolling sums of width `window_minutes` (minimum period 1).
///
/// Only `event == auth` rows participate. Output is ordered by
/// (src_ip, minute) ascending and is deterministic for identical input.
pub fn sliding_window_features(events: &[AuthEvent], window_minutes: u32) -> Vec<FeatureRecord> {
    let window = window_minutes.max(1) as usize;
    let span_sec = (window * 60) as f64;

    // group by (src_ip, minute); BTreeMap gives the output ordering for free
    let mut buckets: BTreeMap<(String, DateTime<Utc>), MinuteBucket> = BTreeMap::new();
    for ev in events {
        if ev.event != EventKind::Auth {
            continue;
        }
        let bucket = buckets
            .entry((ev.src_ip.clone(), minute_floor(ev.timestamp)))
            .or_default();
        bucket.total += 1;
        match ev.status {
            Outcome::Fail => bucket.fails += 1,
            Outcome::Success => bucket.successes += 1,
            Outcome::None => {}
        }
        bucket.users.insert(ev.user.clone());
        bucket.ports.insert(ev.port.clone());
    }

    let mut records = Vec::with_capacity(buckets.len());
    let mut current_ip: Option<&str> = None;
    let mut trailing: VecDeque<[u64; 5]> = VecDeque::with_capacity(window);
    let mut sums = [0u64; 5];

    for ((src_ip, minute), bucket) in &buckets {
        if current_ip != Some(src_ip.as_str()) {
            current_ip = Some(src_ip.as_str());
            trailing.clear();
            sums = [0; 5];
        }

        let base = [
            bucket.total,
            bucket.fails,
            bucket.successes,
            bucket.users.len() as u64,
            bucket.ports.len() as u64,
        ];
        if trailing.len() == window {
            if let Some(old) = trailing.pop_front() {
                for (s, o) in sums.iter_mut().zip(old) {
                    *s -= o;
                }
            }
        }
        for (s, b) in sums.iter_mut().zip(base) {
            *s += b;
        }
        trailing.push_back(base);

        let denom = sums[0].max(1) as f64;
        records.push(FeatureRecord {
            src_ip: src_ip.clone(),
            minute: *minute,
            total: base[0],
            fails: base[1],
            successes: base[2],
            users: base[3],
            ports: base[4],
            win_total: sums[0],
            win_fails: sums[1],
            win_successes: sums[2],
            win_users: sums[3],
            win_ports: sums[4],
            fail_rate: sums[1] as f64 / denom,
            avg_interval_sec: span_sec / denom,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ev(minute: u32, sec: u32, ip: &str, user: &str, status: Outcome, port: &str) -> AuthEvent {
        AuthEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 9, 20, 10, minute, sec).unwrap(),
            src_ip: ip.to_string(),
            user: user.to_string(),
            event: EventKind::Auth,
            status,
            port: port.to_string(),
        }
    }

    #[test]
    fn test_minute_floor() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 20, 10, 3, 59).unwrap();
        assert_eq!(
            minute_floor(ts),
            Utc.with_ymd_and_hms(2025, 9, 20, 10, 3, 0).unwrap()
        );
    }

    #[test]
    fn test_per_minute_base_counts() {
        let events = vec![
            ev(0, 10, "10.0.0.1", "root", Outcome::Fail, "22"),
            ev(0, 20, "10.0.0.1", "admin", Outcome::Fail, "22"),
            ev(0, 30, "10.0.0.1", "root", Outcome::Success, "2222"),
        ];
        let records = sliding_window_features(&events, 5);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.total, 3);
        assert_eq!(r.fails, 2);
        assert_eq!(r.successes, 1);
        assert_eq!(r.users, 2);
        assert_eq!(r.ports, 2);
    }

    #[test]
    fn test_rolling_sums_with_gaps_and_multiple_sources() {
        // three sources, irregular gaps; window of 2 observed minutes
        let events = vec![
            // a: minutes 0, 1, 4
            ev(0, 0, "a", "u1", Outcome::Fail, "22"),
            ev(1, 0, "a", "u1", Outcome::Fail, "22"),
            ev(1, 30, "a", "u2", Outcome::Fail, "22"),
            ev(4, 0, "a", "u1", Outcome::Success, "22"),
            // b: minutes 2, 7
            ev(2, 0, "b", "u1", Outcome::Fail, "22"),
            ev(7, 0, "b", "u1", Outcome::Fail, "23"),
            // c: single minute
            ev(5, 0, "c", "u9", Outcome::Success, "22"),
        ];
        let records = sliding_window_features(&events, 2);
        let by_key: Vec<(&str, u32, u64, u64)> = records
            .iter()
            .map(|r| {
                (
                    r.src_ip.as_str(),
                    r.minute.format("%M").to_string().parse().unwrap(),
                    r.win_total,
                    r.win_fails,
                )
            })
            .collect();

        // partial window at each source's first bucket
        assert_eq!(by_key[0], ("a", 0, 1, 1));
        // full window over minutes 0..=1
        assert_eq!(by_key[1], ("a", 1, 3, 3));
        // gap: window covers the last two observed buckets (1 and 4)
        assert_eq!(by_key[2], ("a", 4, 3, 2));
        assert_eq!(by_key[3], ("b", 2, 1, 1));
        assert_eq!(by_key[4], ("b", 7, 2, 2));
        assert_eq!(by_key[5], ("c", 5, 1, 0));
    }

    #[test]
    fn test_window_of_one_equals_base_counts() {
        let events = vec![
            ev(0, 0, "a", "u1", Outcome::Fail, "22"),
            ev(1, 0, "a", "u1", Outcome::Fail, "22"),
            ev(2, 0, "a", "u1", Outcome::Fail, "22"),
        ];
        for r in sliding_window_features(&events, 1) {
            assert_eq!(r.win_total, r.total);
            assert_eq!(r.win_fails, r.fails);
        }
    }

    #[test]
    fn test_window_coerced_to_at_least_one() {
        let events = vec![ev(0, 0, "a", "u1", Outcome::Fail, "22")];
        let records = sliding_window_features(&events, 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].win_total, 1);
        assert_eq!(records[0].avg_interval_sec, 60.0);
    }

    #[test]
    fn test_derived_ratios() {
        let events = vec![
            ev(0, 0, "a", "u1", Outcome::Fail, "22"),
            ev(0, 1, "a", "u1", Outcome::Fail, "22"),
            ev(0, 2, "a", "u1", Outcome::Success, "22"),
            ev(0, 3, "a", "u1", Outcome::Fail, "22"),
        ];
        let records = sliding_window_features(&events, 5);
        let r = &records[0];
        assert!((r.fail_rate - 0.75).abs() < 1e-12);
        assert!((r.avg_interval_sec - 300.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_auth_events_excluded() {
        let mut other = ev(0, 0, "a", "u1", Outcome::Fail, "22");
        other.event = EventKind::Other;
        assert!(sliding_window_features(&[other], 5).is_empty());
    }
}
