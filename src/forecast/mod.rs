//! Short-horizon trend forecasting over per-minute failure counts.

use crate::detect::stats::linear_fit;
use crate::detect::Finding;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fewer observed minutes than this and no trend is extrapolated.
const MIN_SERIES_POINTS: usize = 3;

/// One observed minute: total fails and how many findings were suspicious.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub minute: DateTime<Utc>,
    pub fails_per_min: f64,
    pub anomalies: u64,
}

/// One extrapolated future minute.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub minute: DateTime<Utc>,
    pub forecast: f64,
}

/// Collapse findings into a per-minute series: the raw per-minute fail
/// counts summed across sources, plus a count of suspicious findings.
/// Empty findings produce an empty series.
pub fn build_series(findings: &[Finding]) -> Vec<SeriesPoint> {
    let mut by_minute: BTreeMap<DateTime<Utc>, (u64, u64)> = BTreeMap::new();
    for f in findings {
        let entry = by_minute.entry(f.features.minute).or_insert((0, 0));
        entry.0 += f.features.fails;
        entry.1 += f.is_suspicious as u64;
    }
    by_minute
        .into_iter()
        .map(|(minute, (fails, anomalies))| SeriesPoint {
            minute,
            fails_per_min: fails as f64,
            anomalies,
        })
        .collect()
}

/// Fit a straight line to the series (indexed by sequential position, not
/// raw time, so irregular gaps don't skew the regression) and extrapolate
/// `horizon_minutes` steps past the last observed minute.
///
/// Forecast values are clipped at 0 -- failure counts cannot go negative.
/// Fewer than three points returns an empty forecast, not an error.
pub fn linear_forecast(series: &[SeriesPoint], horizon_minutes: u32) -> Vec<ForecastPoint> {
    if series.len() < MIN_SERIES_POINTS {
        return Vec::new();
    }

    let ys: Vec<f64> = series.iter().map(|p| p.fails_per_min).collect();
    let (slope, intercept) = linear_fit(&ys);

    let last_minute = series[series.len() - 1].minute;
    let n = ys.len() as f64;
    (1..=horizon_minutes)
        .map(|step| {
            let x = n - 1.0 + step as f64;
            ForecastPoint {
                minute: last_minute + Duration::minutes(step as i64),
                forecast: (slope * x + intercept).max(0.0),
            }
        })
        .collect()
}
