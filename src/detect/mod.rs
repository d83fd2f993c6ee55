//! Detection pipeline -- windowed features, rule engine, outlier scoring,
//! finding merge, and incident aggregation.

pub mod features;
pub mod findings;
pub mod forest;
pub mod incident;
pub mod rules;
pub mod stats;

use crate::ingest::{AuthEvent, FirewallEvent};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use self::findings::Finding;
pub use self::incident::{FirewallIncident, Incident};

/// Severity buckets for ranked incidents, population-relative per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Severity::High),
            "Medium" => Ok(Severity::Medium),
            "Low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Tunables for one detection run. All fields have safe defaults and are
/// clamped into valid ranges before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Trailing window width in minute buckets.
    pub window_minutes: u32,
    /// Rolling fail count at which the brute-force rule fires.
    pub fail_threshold: u32,
    /// Expected anomaly fraction; sets the run-relative model flag cutoff.
    pub contamination: f64,
    /// Result size cap for ranked incidents.
    pub top_k: usize,
    /// Forecast horizon in minutes.
    pub horizon_minutes: u32,
    /// RNG seed for the outlier model.
    pub seed: u64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            fail_threshold: 10,
            contamination: 0.02,
            top_k: 50,
            horizon_minutes: 60,
            seed: 42,
        }
    }
}

impl DetectionParams {
    /// Coerce every field into its valid range, logging anything adjusted.
    pub fn clamped(mut self) -> Self {
        if self.window_minutes < 1 {
            warn!(window_minutes = self.window_minutes, "window_minutes below 1, using 1");
            self.window_minutes = 1;
        }
        if self.fail_threshold < 1 {
            warn!(fail_threshold = self.fail_threshold, "fail_threshold below 1, using 1");
            self.fail_threshold = 1;
        }
        if self.top_k < 1 {
            warn!(top_k = self.top_k, "top_k below 1, using 1");
            self.top_k = 1;
        }
        if self.horizon_minutes < 1 {
            warn!(horizon_minutes = self.horizon_minutes, "horizon_minutes below 1, using 1");
            self.horizon_minutes = 1;
        }
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            warn!(contamination = self.contamination, "contamination outside (0, 1), using 0.02");
            self.contamination = 0.02;
        }
        self
    }
}

/// Output of one authentication-category detection run.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRun {
    pub findings: Vec<Finding>,
    pub incidents: Vec<Incident>,
}

/// Run the full pipeline over authentication events: features -> rule
/// flags -> outlier scores -> merged findings -> ranked incidents.
///
/// Pure and idempotent: identical events and params (including the seed)
/// produce identical output.
pub fn run_detection(events: &[AuthEvent], params: &DetectionParams) -> DetectionRun {
    let params = params.clone().clamped();

    let features = features::sliding_window_features(events, params.window_minutes);
    info!(
        events = events.len(),
        records = features.len(),
        window_minutes = params.window_minutes,
        "extracted windowed features"
    );

    let rule_flags = rules::apply_rules(&features, params.fail_threshold);
    let (model_scores, model_flags) =
        forest::score_features(&features, params.contamination, params.seed);
    let findings = findings::merge_findings(features, rule_flags, model_scores, model_flags);

    let incidents = incident::summarize_incidents(&findings, params.top_k);
    info!(
        findings = findings.len(),
        incidents = incidents.len(),
        "detection run complete"
    );

    DetectionRun {
        findings,
        incidents,
    }
}

/// Run the deny-count aggregation for the firewall category. No per-minute
/// findings exist for this category; the single signal goes straight to
/// ranked incidents.
pub fn run_firewall_detection(
    events: &[FirewallEvent],
    params: &DetectionParams,
) -> Vec<FirewallIncident> {
    let params = params.clone().clamped();
    let incidents = incident::summarize_firewall_incidents(events, params.top_k);
    info!(
        events = events.len(),
        incidents = incidents.len(),
        "firewall detection run complete"
    );
    incidents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_clamp() {
        let p = DetectionParams {
            window_minutes: 0,
            fail_threshold: 0,
            contamination: 1.5,
            top_k: 0,
            horizon_minutes: 0,
            seed: 7,
        }
        .clamped();
        assert_eq!(p.window_minutes, 1);
        assert_eq!(p.fail_threshold, 1);
        assert_eq!(p.top_k, 1);
        assert_eq!(p.horizon_minutes, 1);
        assert_eq!(p.contamination, 0.02);
        assert_eq!(p.seed, 7);
    }

    #[test]
    fn test_severity_round_trip() {
        for s in [Severity::High, Severity::Medium, Severity::Low] {
            assert_eq!(s.as_str().parse::<Severity>().unwrap(), s);
        }
        assert!("bogus".parse::<Severity>().is_err());
    }

    #[test]
    fn test_empty_input_runs_clean() {
        let run = run_detection(&[], &DetectionParams::default());
        assert!(run.findings.is_empty());
        assert!(run.incidents.is_empty());
    }
}
