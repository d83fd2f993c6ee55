//! Merge of rule and model signals into per-minute findings.

use crate::detect::features::FeatureRecord;
use serde::Serialize;

/// A feature record annotated with both detection signals. One finding per
/// (src_ip, minute).
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    #[serde(flatten)]
    pub features: FeatureRecord,
    pub rule_flag: bool,
    pub model_score: f64,
    pub model_flag: bool,
    pub is_suspicious: bool,
}

/// Zip the three signal vectors back onto the records. Keeps rule and model
/// evolution decoupled from everything downstream: consumers only look at
/// `is_suspicious` and the individual flags.
pub fn merge_findings(
    features: Vec<FeatureRecord>,
    rule_flags: Vec<bool>,
    model_scores: Vec<f64>,
    model_flags: Vec<bool>,
) -> Vec<Finding> {
    features
        .into_iter()
        .zip(rule_flags)
        .zip(model_scores.into_iter().zip(model_flags))
        .map(|((features, rule_flag), (model_score, model_flag))| Finding {
            features,
            rule_flag,
            model_score,
            model_flag,
            is_suspicious: rule_flag || model_flag,
        })
        .collect()
}
