// =============================================================================
// Snapshot Assembly — candles -> RSI -> SMA-of-RSI -> trimmed SymbolSnapshot
// =============================================================================
//
// The batch requested upstream is `display_limit + rsi_period + 1` candles:
// one candle is lost to differencing and `rsi_period` changes seed the
// averages, which leaves `display_limit` RSI points when the exchange has
// enough history.  Both series are trimmed independently to the newest
// `display_limit` points; trimmed points keep their original timestamps.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::rsi::rsi_series;
use super::sma::sma_series;
use super::IndicatorPoint;
use crate::market_data::Candle;

fn default_rsi_period() -> usize {
    14
}

fn default_sma_period() -> usize {
    14
}

fn default_display_limit() -> usize {
    80
}

/// Look-back periods and display length for one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Wilder RSI period.
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Window of the simple moving average applied to the RSI series.
    #[serde(default = "default_sma_period")]
    pub sma_period: usize,

    /// Maximum number of points kept in each published series.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            sma_period: default_sma_period(),
            display_limit: default_display_limit(),
        }
    }
}

impl IndicatorParams {
    /// Number of candles to request so that `display_limit` RSI points can be
    /// produced. Saturates instead of overflowing.
    pub fn required_candles(&self) -> usize {
        self.display_limit
            .saturating_add(self.rsi_period)
            .saturating_add(1)
    }
}

/// Indicator output for one symbol and one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub rsi: Vec<IndicatorPoint>,
    pub sma: Vec<IndicatorPoint>,
    /// Close of the newest candle in the batch.
    pub price: f64,
    /// Volume of the newest candle in the batch.
    pub volume: f64,
}

impl SymbolSnapshot {
    /// The uniform "no data" shape: empty series, zero price and volume.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.last().map(|p| p.value)
    }

    pub fn latest_sma(&self) -> Option<f64> {
        self.sma.last().map(|p| p.value)
    }
}

/// Run the full engine over one candle batch (oldest first).
///
/// Never fails: an empty batch gives [`SymbolSnapshot::empty`], a short batch
/// gives empty series with price and volume still taken from the newest
/// candle.
pub fn compute_snapshot(candles: &[Candle], params: &IndicatorParams) -> SymbolSnapshot {
    let Some(latest) = candles.last() else {
        return SymbolSnapshot::empty();
    };

    let rsi = rsi_series(candles, params.rsi_period);
    let sma = sma_series(&rsi, params.sma_period);

    SymbolSnapshot {
        rsi: keep_newest(rsi, params.display_limit),
        sma: keep_newest(sma, params.display_limit),
        price: latest.close,
        volume: latest.volume,
    }
}

/// Drop the oldest points so that at most `limit` remain.
fn keep_newest(mut series: Vec<IndicatorPoint>, limit: usize) -> Vec<IndicatorPoint> {
    let excess = series.len().saturating_sub(limit);
    series.drain(..excess);
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open_time = 1_700_000_000_000 + i as i64 * 900_000;
                Candle::new(open_time, c, c + 1.0, c - 1.0, c, 5.0 + i as f64, open_time + 899_999)
            })
            .collect()
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 250.0 + (i as f64 * 0.45).sin() * 12.0 + (i as f64 * 0.13).cos() * 4.0)
            .collect()
    }

    #[test]
    fn default_params() {
        let p = IndicatorParams::default();
        assert_eq!(p.rsi_period, 14);
        assert_eq!(p.sma_period, 14);
        assert_eq!(p.display_limit, 80);
        assert_eq!(p.required_candles(), 95);
    }

    #[test]
    fn required_candles_saturates() {
        let p = IndicatorParams {
            display_limit: usize::MAX,
            ..IndicatorParams::default()
        };
        assert_eq!(p.required_candles(), usize::MAX);
    }

    #[test]
    fn params_partial_json_fills_defaults() {
        let p: IndicatorParams = serde_json::from_str(r#"{ "rsi_period": 7 }"#).unwrap();
        assert_eq!(p.rsi_period, 7);
        assert_eq!(p.sma_period, 14);
        assert_eq!(p.display_limit, 80);
    }

    #[test]
    fn empty_batch_gives_zeroed_snapshot() {
        let snap = compute_snapshot(&[], &IndicatorParams::default());
        assert_eq!(snap, SymbolSnapshot::empty());
        assert!(snap.rsi.is_empty());
        assert!(snap.sma.is_empty());
        assert_eq!(snap.price, 0.0);
        assert_eq!(snap.volume, 0.0);
        assert_eq!(
            serde_json::to_value(&snap).unwrap(),
            serde_json::json!({ "rsi": [], "sma": [], "price": 0.0, "volume": 0.0 })
        );
    }

    #[test]
    fn short_batch_keeps_price_and_volume() {
        let candles = candles_from_closes(&[10.0, 11.0, 12.5]);
        let snap = compute_snapshot(&candles, &IndicatorParams::default());
        assert!(snap.rsi.is_empty());
        assert!(snap.sma.is_empty());
        assert_eq!(snap.price, 12.5);
        assert_eq!(snap.volume, 7.0);
    }

    #[test]
    fn flat_batch_of_twenty() {
        let candles = candles_from_closes(&[100.0; 20]);
        let snap = compute_snapshot(&candles, &IndicatorParams::default());
        assert_eq!(snap.rsi.len(), 5);
        assert!(snap.rsi.iter().all(|p| p.value == 100.0));
        // Five RSI points cannot fill a 14-wide SMA window.
        assert!(snap.sma.is_empty());
    }

    #[test]
    fn full_request_window_yields_display_limit_rsi_points() {
        let params = IndicatorParams::default();
        let candles = candles_from_closes(&wavy(params.required_candles()));
        let snap = compute_snapshot(&candles, &params);
        assert_eq!(snap.rsi.len(), params.display_limit);
        assert_eq!(
            snap.sma.len(),
            params.display_limit - params.sma_period + 1
        );
    }

    #[test]
    fn every_point_time_is_a_candle_open_time() {
        let candles = candles_from_closes(&wavy(120));
        let params = IndicatorParams {
            rsi_period: 9,
            sma_period: 5,
            display_limit: 60,
        };
        let snap = compute_snapshot(&candles, &params);
        assert!(!snap.rsi.is_empty());
        assert!(!snap.sma.is_empty());
        for p in snap.rsi.iter().chain(snap.sma.iter()) {
            assert!(candles.iter().any(|c| c.open_time == p.time));
        }
    }

    #[test]
    fn sma_times_match_rsi_right_edges() {
        let candles = candles_from_closes(&wavy(70));
        let params = IndicatorParams {
            rsi_period: 14,
            sma_period: 14,
            display_limit: 1_000,
        };
        let snap = compute_snapshot(&candles, &params);
        let q = params.sma_period;
        assert_eq!(snap.sma.len(), snap.rsi.len() - q + 1);
        for (i, p) in snap.sma.iter().enumerate() {
            assert_eq!(p.time, snap.rsi[i + q - 1].time);
        }
    }

    #[test]
    fn trimming_keeps_newest_points_unchanged() {
        let candles = candles_from_closes(&wavy(150));
        let untrimmed = IndicatorParams {
            display_limit: usize::MAX / 2,
            ..IndicatorParams::default()
        };
        let trimmed = IndicatorParams {
            display_limit: 25,
            ..IndicatorParams::default()
        };
        let full = compute_snapshot(&candles, &untrimmed);
        let short = compute_snapshot(&candles, &trimmed);

        assert_eq!(short.rsi.len(), 25);
        assert_eq!(short.sma.len(), 25);
        assert_eq!(short.rsi[..], full.rsi[full.rsi.len() - 25..]);
        assert_eq!(short.sma[..], full.sma[full.sma.len() - 25..]);
        assert_eq!(short.price, full.price);
        assert_eq!(short.volume, full.volume);
    }

    #[test]
    fn display_limit_zero_keeps_price_only() {
        let candles = candles_from_closes(&wavy(50));
        let params = IndicatorParams {
            display_limit: 0,
            ..IndicatorParams::default()
        };
        let snap = compute_snapshot(&candles, &params);
        assert!(snap.rsi.is_empty());
        assert!(snap.sma.is_empty());
        assert_eq!(snap.price, candles[49].close);
    }

    #[test]
    fn latest_accessors() {
        let candles = candles_from_closes(&(1..=40).map(|x| x as f64).collect::<Vec<_>>());
        let snap = compute_snapshot(&candles, &IndicatorParams::default());
        assert_eq!(snap.latest_rsi(), Some(100.0));
        assert_eq!(snap.latest_sma(), Some(100.0));
        assert_eq!(SymbolSnapshot::empty().latest_rsi(), None);
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let candles = candles_from_closes(&wavy(95));
        let params = IndicatorParams::default();
        assert_eq!(
            compute_snapshot(&candles, &params),
            compute_snapshot(&candles, &params)
        );
    }
}
