// =============================================================================
// Candles and the source that supplies them
// =============================================================================

use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::Timeframe;

/// A single OHLCV candle as returned by the exchange klines endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Anything that can hand back an ordered (oldest first) candle batch for a
/// symbol and timeframe.
///
/// Implementations report transport and parse failures as errors; the poller
/// decides how a failed symbol degrades.
pub trait CandleSource: Send + Sync {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}
