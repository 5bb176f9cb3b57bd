// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute price changes from consecutive closes and split each into a
//          gain (positive part) and a loss (magnitude of the negative part).
// Step 2 — Seed average gain / average loss with the arithmetic mean of the
//          first `period` gains / losses.
// Step 3 — For every later change, emit RSI from the current averages, then
//          apply Wilder's smoothing to roll the averages forward:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss   (+inf when avg_loss == 0)
//          RSI = 100 - 100 / (1 + RS)
//
// The emitted value always comes from the averages *before* the update, so a
// batch of N closes yields N - period - 1 values and the k-th value belongs to
// the candle at index period + 1 + k.
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::IndicatorPoint;
use crate::market_data::Candle;

/// Lower bound of the overbought zone.
pub const OVERBOUGHT: f64 = 70.0;
/// Upper bound of the oversold zone.
pub const OVERSOLD: f64 = 30.0;

/// Compute the raw RSI values for `closes` and `period`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() <= period` => empty vec (insufficient history)
/// - Average loss of zero (including a perfectly flat market) => exactly 100.0
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    // --- Per-step gains and losses -------------------------------------------
    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    // --- Seed averages with the mean of the first `period` steps -------------
    let period_f = period as f64;
    let seed_gain = gains[..period].iter().sum::<f64>() / period_f;
    let seed_loss = losses[..period].iter().sum::<f64>() / period_f;

    // --- Wilder's smoothing, emitting before each update ---------------------
    gains[period..]
        .iter()
        .zip(&losses[period..])
        .scan((seed_gain, seed_loss), |averages, (&gain, &loss)| {
            let (avg_gain, avg_loss) = *averages;
            let rsi = rsi_from_averages(avg_gain, avg_loss);
            *averages = (
                wilder_step(avg_gain, gain, period_f),
                wilder_step(avg_loss, loss, period_f),
            );
            Some(rsi)
        })
        .collect()
}

/// Compute the RSI series for `candles`, stamping each value with the
/// `open_time` of the candle it belongs to.
pub fn rsi_series(candles: &[Candle], period: usize) -> Vec<IndicatorPoint> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    calculate_rsi(&closes, period)
        .into_iter()
        .zip(candles.iter().skip(period + 1))
        .map(|(value, candle)| IndicatorPoint {
            time: candle.open_time,
            value,
        })
        .collect()
}

/// Where an RSI reading sits relative to the conventional 30/70 bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl RsiZone {
    pub fn classify(value: f64) -> Self {
        if value >= OVERBOUGHT {
            Self::Overbought
        } else if value <= OVERSOLD {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Oversold => write!(f, "OVERSOLD"),
        }
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn wilder_step(prev_avg: f64, sample: f64, period_f: f64) -> f64 {
    (prev_avg * (period_f - 1.0) + sample) / period_f
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// A zero average loss means RS is infinite and RSI saturates at exactly
/// 100.0; the division is never performed, so no NaN can leak downstream.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open_time = 1_700_000_000_000 + i as i64 * 60_000;
                Candle::new(open_time, c, c, c, c, 10.0, open_time + 59_999)
            })
            .collect()
    }

    /// Deterministic, non-monotonic close series.
    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    // ---- calculate_rsi ---------------------------------------------------

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn rsi_insufficient_data() {
        // 15 closes => 14 changes, all consumed by the seed => nothing to emit.
        let closes: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        assert!(calculate_rsi(&closes, 14).is_empty());
        assert!(calculate_rsi(&closes[..14], 14).is_empty());
    }

    #[test]
    fn rsi_length_is_n_minus_period_minus_one() {
        for period in 1..=20 {
            for n in 0..60 {
                let series = calculate_rsi(&wavy(n), period);
                assert_eq!(
                    series.len(),
                    n.saturating_sub(period + 1),
                    "n={n} period={period}"
                );
            }
        }
    }

    #[test]
    fn rsi_all_gains() {
        // Linear ramp 1..=30 => every loss is zero => RSI is exactly 100.
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 15);
        for &v in &series {
            assert_eq!(v, 100.0);
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 15);
        for &v in &series {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn rsi_flat_market_saturates_at_100() {
        // No movement at all => average loss is zero => RS = +inf => 100.
        let closes = vec![100.0; 20];
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 5);
        for &v in &series {
            assert_eq!(v, 100.0);
            assert!(!v.is_nan());
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 3);
        for &v in &series {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_range_check_across_periods() {
        let closes = wavy(200);
        for period in 1..=30 {
            for &v in &calculate_rsi(&closes, period) {
                assert!((0.0..=100.0).contains(&v), "period {period}: RSI {v}");
            }
        }
    }

    #[test]
    fn rsi_matches_hand_computed_wilder_recurrence() {
        // closes 1,2,1,2,3 with period 2:
        //   gains  = [1, 0, 1, 1], losses = [0, 1, 0, 0]
        //   seed   avg_gain = 0.5, avg_loss = 0.5   => RSI 50 (emitted)
        //   update avg_gain = 0.75, avg_loss = 0.25 => RSI 75 (emitted)
        //   the final update is never emitted.
        let series = calculate_rsi(&[1.0, 2.0, 1.0, 2.0, 3.0], 2);
        assert_eq!(series.len(), 2);
        assert!((series[0] - 50.0).abs() < 1e-12);
        assert!((series[1] - 75.0).abs() < 1e-12);
    }

    #[test]
    fn rsi_emits_before_updating_averages() {
        // A single value comes straight from the seed window: the drop after
        // the seed must not influence it.
        let series = calculate_rsi(&[10.0, 11.0, 12.0, 0.0], 2);
        assert_eq!(series, vec![100.0]);
    }

    // ---- rsi_series ------------------------------------------------------

    #[test]
    fn series_is_aligned_to_candle_after_seed_window() {
        let candles = candles_from_closes(&wavy(40));
        let period = 14;
        let series = rsi_series(&candles, period);
        assert_eq!(series.len(), 40 - period - 1);
        for (k, point) in series.iter().enumerate() {
            assert_eq!(point.time, candles[period + 1 + k].open_time);
        }
    }

    #[test]
    fn series_times_strictly_increase() {
        let candles = candles_from_closes(&wavy(60));
        let series = rsi_series(&candles, 5);
        assert!(series.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn series_empty_when_history_too_short() {
        let candles = candles_from_closes(&wavy(14));
        assert!(rsi_series(&candles, 14).is_empty());
    }

    // ---- RsiZone ---------------------------------------------------------

    #[test]
    fn zone_boundaries() {
        assert_eq!(RsiZone::classify(70.0), RsiZone::Overbought);
        assert_eq!(RsiZone::classify(100.0), RsiZone::Overbought);
        assert_eq!(RsiZone::classify(30.0), RsiZone::Oversold);
        assert_eq!(RsiZone::classify(0.0), RsiZone::Oversold);
        assert_eq!(RsiZone::classify(50.0), RsiZone::Neutral);
        assert_eq!(RsiZone::classify(69.99), RsiZone::Neutral);
    }

    #[test]
    fn zone_serialises_as_label() {
        assert_eq!(
            serde_json::to_string(&RsiZone::Overbought).unwrap(),
            "\"OVERBOUGHT\""
        );
        assert_eq!(RsiZone::Oversold.to_string(), "OVERSOLD");
    }
}
