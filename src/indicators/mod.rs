// =============================================================================
// Indicator Engine
// =============================================================================
//
// Pure, side-effect-free transformation from a candle batch to the RSI series,
// the SMA-of-RSI series and the latest price/volume.  Nothing in here performs
// I/O or touches shared state, so one call per symbol can run concurrently.
//
// Insufficient history is never an error: the affected series is simply empty.

pub mod rsi;
pub mod sma;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use rsi::RsiZone;
pub use snapshot::{compute_snapshot, IndicatorParams, SymbolSnapshot};

/// One indicator value stamped with the `open_time` of the candle it was
/// derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}
