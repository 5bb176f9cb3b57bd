// =============================================================================
// Simple Moving Average of the RSI series
// =============================================================================
//
// An unweighted mean over a sliding window of `period` consecutive RSI points.
// Unlike the Wilder smoothing inside the RSI itself there is no recursion: each
// output depends only on the values inside its own window.
// =============================================================================

use super::IndicatorPoint;

/// Smooth `points` with a trailing window of `period` values.
///
/// Each output point inherits the `time` of the last point in its window.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `points.len() < period` => empty vec
pub fn sma_series(points: &[IndicatorPoint], period: usize) -> Vec<IndicatorPoint> {
    if period == 0 || points.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    points
        .windows(period)
        .map(|window| IndicatorPoint {
            time: window[period - 1].time,
            value: window.iter().map(|p| p.value).sum::<f64>() / period_f,
        })
        .collect()
}
