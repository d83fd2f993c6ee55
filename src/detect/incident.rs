//! Per-source incident aggregation, risk scoring, and severity bucketing.

use crate::detect::findings::Finding;
use crate::detect::stats::{min_max_normalize, quantile};
use crate::detect::Severity;
use crate::ingest::FirewallEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const RULE_WEIGHT: f64 = 2.0;
const MODEL_WEIGHT: f64 = 10.0;

/// One source rolled up over all its findings in a run.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub src_ip: String,
    pub last_seen: DateTime<Utc>,
    pub max_model_score: f64,
    pub rule_hits: u64,
    pub total_minutes: u64,
    pub risk: f64,
    pub severity: Severity,
}

/// Aggregate findings per src_ip, score risk, and bucket severity against
/// this run's population (High >= p80, Medium >= p50, else Low).
///
/// Empty findings yield an empty result, never an error.
pub fn summarize_incidents(findings: &[Finding], top_k: usize) -> Vec<Incident> {
    if findings.is_empty() {
        return Vec::new();
    }

    struct Agg {
        last_seen: DateTime<Utc>,
        max_model_score: f64,
        rule_hits: u64,
        total_minutes: u64,
    }

    let mut by_ip: BTreeMap<&str, Agg> = BTreeMap::new();
    for f in findings {
        let agg = by_ip.entry(f.features.src_ip.as_str()).or_insert(Agg {
            last_seen: f.features.minute,
            max_model_score: f.model_score,
            rule_hits: 0,
            total_minutes: 0,
        });
        agg.last_seen = agg.last_seen.max(f.features.minute);
        agg.max_model_score = agg.max_model_score.max(f.model_score);
        agg.rule_hits += f.rule_flag as u64;
        agg.total_minutes += 1;
    }

    let max_scores: Vec<f64> = by_ip.values().map(|a| a.max_model_score).collect();
    let norm = min_max_normalize(&max_scores);

    let mut incidents: Vec<Incident> = by_ip
        .into_iter()
        .zip(norm)
        .map(|((src_ip, agg), norm_score)| Incident {
            src_ip: src_ip.to_string(),
            last_seen: agg.last_seen,
            max_model_score: agg.max_model_score,
            rule_hits: agg.rule_hits,
            total_minutes: agg.total_minutes,
            risk: RULE_WEIGHT * agg.rule_hits as f64 + MODEL_WEIGHT * norm_score,
            severity: Severity::Low,
        })
        .collect();

    let risks: Vec<f64> = incidents.iter().map(|i| i.risk).collect();
    let p80 = quantile(&risks, 0.8);
    let p50 = quantile(&risks, 0.5);
    for incident in &mut incidents {
        incident.severity = if incident.risk >= p80 {
            Severity::High
        } else if incident.risk >= p50 {
            Severity::Medium
        } else {
            Severity::Low
        };
    }

    incidents.sort_by(|a, b| {
        b.risk
            .partial_cmp(&a.risk)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.last_seen.cmp(&a.last_seen))
    });
    incidents.truncate(top_k);
    incidents
}

/// One source rolled up over its denied firewall events.
#[derive(Debug, Clone, Serialize)]
pub struct FirewallIncident {
    pub src_ip: String,
    pub denies: u64,
    pub last_seen: DateTime<Utc>,
    pub risk: f64,
    pub severity: Severity,
}

/// Deny-count aggregation for the firewall category. There is only one
/// signal here, so severity comes from rank-based equal-population tertiles
/// instead of the risk-weighted formula.
pub fn summarize_firewall_incidents(
    events: &[FirewallEvent],
    top_k: usize,
) -> Vec<FirewallIncident> {
    let mut by_ip: BTreeMap<&str, (u64, DateTime<Utc>)> = BTreeMap::new();
    for ev in events {
        if !ev.action.eq_ignore_ascii_case("deny") {
            continue;
        }
        let entry = by_ip
            .entry(ev.src_ip.as_str())
            .or_insert((0, ev.timestamp));
        entry.0 += 1;
        entry.1 = entry.1.max(ev.timestamp);
    }
    if by_ip.is_empty() {
        return Vec::new();
    }

    let mut incidents: Vec<FirewallIncident> = by_ip
        .into_iter()
        .map(|(src_ip, (denies, last_seen))| FirewallIncident {
            src_ip: src_ip.to_string(),
            denies,
            last_seen,
            risk: denies as f64,
            severity: Severity::Low,
        })
        .collect();

    // rank entities by deny count (stable sort, so ties keep source order),
    // then cut the 1-based ranks into three equal-population tiers
    let mut order: Vec<usize> = (0..incidents.len()).collect();
    order.sort_by_key(|&i| incidents[i].denies);
    let n = incidents.len();
    let ranks: Vec<f64> = (1..=n).map(|r| r as f64).collect();
    let t1 = quantile(&ranks, 1.0 / 3.0);
    let t2 = quantile(&ranks, 2.0 / 3.0);
    for (rank0, &idx) in order.iter().enumerate() {
        let rank = (rank0 + 1) as f64;
        incidents[idx].severity = if rank <= t1 {
            Severity::Low
        } else if rank <= t2 {
            Severity::Medium
        } else {
            Severity::High
        };
    }

    incidents.sort_by(|a, b| {
        b.denies
            .cmp(&a.denies)
            .then(b.last_seen.cmp(&a.last_seen))
    });
    incidents.truncate(top_k);
    incidents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::features::FeatureRecord;
    use chrono::TimeZone;

    fn finding(ip: &str, minute: u32, rule_flag: bool, model_score: f64) -> Finding {
        let minute = Utc.with_ymd_and_hms(2025, 9, 20, 10, minute, 0).unwrap();
        Finding {
            features: FeatureRecord {
                src_ip: ip.to_string(),
                minute,
                total: 1,
                fails: 1,
                successes: 0,
                users: 1,
                ports: 1,
                win_total: 1,
                win_fails: 1,
                win_successes: 0,
                win_users: 1,
                win_ports: 1,
                fail_rate: 1.0,
                avg_interval_sec: 300.0,
            },
            rule_flag,
            model_score,
            model_flag: false,
            is_suspicious: rule_flag,
        }
    }

    #[test]
    fn test_empty_findings_empty_result() {
        assert!(summarize_incidents(&[], 10).is_empty());
    }

    #[test]
    fn test_aggregation_fields() {
        let findings = vec![
            finding("a", 0, true, 0.5),
            finding("a", 3, false, 0.8),
            finding("a", 1, true, 0.2),
            finding("b", 2, false, 0.4),
        ];
        let incidents = summarize_incidents(&findings, 10);
        assert_eq!(incidents.len(), 2);

        let a = incidents.iter().find(|i| i.src_ip == "a").unwrap();
        assert_eq!(a.rule_hits, 2);
        assert_eq!(a.total_minutes, 3);
        assert!((a.max_model_score - 0.8).abs() < 1e-12);
        assert_eq!(
            a.last_seen,
            Utc.with_ymd_and_hms(2025, 9, 20, 10, 3, 0).unwrap()
        );
        // a has max normalized score (1.0) plus 2 rule hits
        assert!((a.risk - (2.0 * 2.0 + 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_scores_normalize_to_zero() {
        let findings = vec![
            finding("a", 0, true, 0.5),
            finding("b", 1, false, 0.5),
            finding("c", 2, false, 0.5),
        ];
        let incidents = summarize_incidents(&findings, 10);
        let b = incidents.iter().find(|i| i.src_ip == "b").unwrap();
        assert_eq!(b.risk, 0.0);
        let a = incidents.iter().find(|i| i.src_ip == "a").unwrap();
        assert_eq!(a.risk, 2.0);
    }

    #[test]
    fn test_severity_partition() {
        // five entities with distinct risks: top one High, middle Medium, rest Low
        let findings: Vec<Finding> = (0..5)
            .map(|i| finding(&format!("ip{i}"), i, false, i as f64 / 10.0))
            .collect();
        let incidents = summarize_incidents(&findings, 10);

        let count = |s: Severity| incidents.iter().filter(|i| i.severity == s).count();
        assert_eq!(count(Severity::High), 1, "only the top clears p80");
        assert_eq!(count(Severity::Medium), 2);
        assert_eq!(count(Severity::Low), 2);
    }

    #[test]
    fn test_all_equal_risks_share_a_bucket() {
        let findings = vec![
            finding("a", 0, false, 0.5),
            finding("b", 1, false, 0.5),
            finding("c", 2, false, 0.5),
        ];
        for i in summarize_incidents(&findings, 10) {
            assert_eq!(i.severity, Severity::High, "equal risks all clear p80");
        }
    }

    #[test]
    fn test_ordering_and_truncation() {
        let findings = vec![
            finding("a", 0, true, 0.9),
            finding("b", 5, true, 0.9),
            finding("c", 2, false, 0.1),
        ];
        let incidents = summarize_incidents(&findings, 2);
        assert_eq!(incidents.len(), 2);
        // a and b tie on risk; the later last_seen wins
        assert_eq!(incidents[0].src_ip, "b");
        assert_eq!(incidents[1].src_ip, "a");
    }

    fn fw(ip: &str, minute: u32, action: &str) -> FirewallEvent {
        FirewallEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 9, 20, 10, minute, 0).unwrap(),
            src_ip: ip.to_string(),
            dst_ip: "192.168.1.5".to_string(),
            port: "443".to_string(),
            action: action.to_string(),
        }
    }

    #[test]
    fn test_firewall_deny_filter_and_tertiles() {
        let mut events = Vec::new();
        for (ip, denies) in [("a", 1u32), ("b", 2), ("c", 3), ("d", 4), ("e", 5), ("f", 6)] {
            for m in 0..denies {
                events.push(fw(ip, m, "deny"));
            }
        }
        events.push(fw("a", 9, "allow")); // ignored

        let incidents = summarize_firewall_incidents(&events, 10);
        assert_eq!(incidents.len(), 6);
        assert_eq!(incidents[0].src_ip, "f");
        assert_eq!(incidents[0].denies, 6);

        let sev = |ip: &str| {
            incidents
                .iter()
                .find(|i| i.src_ip == ip)
                .unwrap()
                .severity
        };
        assert_eq!(sev("a"), Severity::Low);
        assert_eq!(sev("b"), Severity::Low);
        assert_eq!(sev("c"), Severity::Medium);
        assert_eq!(sev("d"), Severity::Medium);
        assert_eq!(sev("e"), Severity::High);
        assert_eq!(sev("f"), Severity::High);
    }

    #[test]
    fn test_firewall_case_insensitive_deny() {
        let events = vec![fw("a", 0, "DENY"), fw("a", 1, "Deny")];
        let incidents = summarize_firewall_incidents(&events, 10);
        assert_eq!(incidents[0].denies, 2);
    }

    #[test]
    fn test_firewall_no_denies_empty() {
        let events = vec![fw("a", 0, "allow")];
        assert!(summarize_firewall_incidents(&events, 10).is_empty());
    }
}
