//! Isolation-forest outlier scoring over the windowed feature matrix.
//!
//! Anomalous rows are isolated in fewer random splits than common ones, so
//! the expected path length through a forest of random trees converts into
//! an anomaly score in (0, 1], higher = more unusual. The RNG seed is an
//! explicit parameter so repeated runs score identically.

use crate::detect::features::FeatureRecord;
use crate::detect::stats::quantile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TREE_COUNT: usize = 100;
const MAX_SUBSAMPLE: usize = 256;

/// Below this many records the model is skipped and every record scores 0.
pub const MIN_SAMPLES: usize = 10;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average unsuccessful-search path length in a BST of n nodes. Normalizes
/// raw path lengths and estimates the depth of an unexpanded leaf.
fn avg_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

pub struct IsolationForest {
    trees: Vec<Node>,
    normalizer: f64,
}

impl IsolationForest {
    /// Fit a forest over the row-major matrix. Each tree trains on a
    /// random subsample of at most 256 rows, the standard tree count and
    /// subsample size for this family of models.
    pub fn fit(matrix: &[Vec<f64>], seed: u64) -> Self {
        let n = matrix.len();
        let psi = n.min(MAX_SUBSAMPLE);
        let height_limit = (psi.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(TREE_COUNT);
        for _ in 0..TREE_COUNT {
            let sample = sample_indices(&mut rng, n, psi);
            let rows: Vec<&[f64]> = sample.iter().map(|&i| matrix[i].as_slice()).collect();
            trees.push(build_tree(&rows, &mut rng, 0, height_limit));
        }

        Self {
            trees,
            normalizer: avg_path_length(psi),
        }
    }

    /// Anomaly score for one row: 2^(-E[path] / c(psi)), in (0, 1].
    pub fn score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() || self.normalizer <= 0.0 {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|t| path_length(t, row, 0)).sum();
        let mean = total / self.trees.len() as f64;
        2f64.powf(-mean / self.normalizer)
    }
}

/// Sample `k` distinct indices from 0..n (partial Fisher-Yates).
fn sample_indices(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

fn build_tree(rows: &[&[f64]], rng: &mut StdRng, depth: usize, limit: usize) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // features with spread in this partition; identical rows can't split
    let dims = rows[0].len();
    let splittable: Vec<usize> = (0..dims)
        .filter(|&f| {
            let (mn, mx) = min_max(rows, f);
            mx > mn
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let feature = splittable[rng.gen_range(0..splittable.len())];
    let (mn, mx) = min_max(rows, feature);
    let threshold = rng.gen_range(mn..mx);

    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        rows.iter().copied().partition(|r| r[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, rng, depth + 1, limit)),
        right: Box::new(build_tree(&right, rng, depth + 1, limit)),
    }
}

fn min_max(rows: &[&[f64]], feature: usize) -> (f64, f64) {
    let mut mn = f64::INFINITY;
    let mut mx = f64::NEG_INFINITY;
    for r in rows {
        let v = r[feature];
        if v < mn {
            mn = v;
        }
        if v > mx {
            mx = v;
        }
    }
    (mn, mx)
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + avg_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row.get(*feature).copied().unwrap_or(0.0) < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Score feature records and flag the top `contamination` fraction of the
/// batch. With fewer than [`MIN_SAMPLES`] records the model is skipped:
/// every record scores 0.0 and nothing is flagged.
pub fn score_features(
    features: &[FeatureRecord],
    contamination: f64,
    seed: u64,
) -> (Vec<f64>, Vec<bool>) {
    if features.len() < MIN_SAMPLES {
        return (vec![0.0; features.len()], vec![false; features.len()]);
    }

    let matrix: Vec<Vec<f64>> = features.iter().map(|f| f.feature_vector()).collect();
    let forest = IsolationForest::fit(&matrix, seed);
    let scores: Vec<f64> = matrix.iter().map(|row| forest.score(row)).collect();

    // run-relative flag: the threshold comes from this batch's distribution
    let threshold = quantile(&scores, 1.0 - contamination);
    let flags = scores.iter().map(|s| *s >= threshold).collect();
    (scores, flags)
}
