//! Small statistics helpers shared by the scorer, aggregator, and forecaster.

use std::cmp::Ordering;

/// Empirical quantile with linear interpolation between order statistics.
/// Returns 0.0 for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Min-max scale to [0, 1]. A column with (near-)zero variance maps to all
/// zeros rather than dividing by zero.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mn = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let mx = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if mx - mn < 1e-9 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mn) / (mx - mn)).collect()
}

/// Least-squares line fit of `ys` against x = 0, 1, 2, ...
/// Returns (slope, intercept). A single point yields a flat line.
pub fn linear_fit(ys: &[f64]) -> (f64, f64) {
    let n = ys.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n == 1 {
        return (0.0, ys[0]);
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n_f;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    let slope = if var > 0.0 { cov / var } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}
