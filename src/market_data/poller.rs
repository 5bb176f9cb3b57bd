// =============================================================================
// Poller — fetch every symbol, run the indicator engine, publish the cycle
// =============================================================================
//
// One cycle:
//   1. Snapshot symbols, timeframe and indicator params from the config.
//   2. Fetch all symbols concurrently (one request each).
//   3. Run the engine per symbol.  A failed fetch degrades that symbol to the
//      empty snapshot and never affects the others.
//   4. Publish the whole map at once.
//
// Nothing carries over between cycles except what was published.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::binance::KLINES_WEIGHT;
use crate::indicators::{compute_snapshot, SymbolSnapshot};
use crate::market_data::CandleSource;

/// What a single call to [`poll_cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed { published: usize, failed: usize },
    /// The request-weight budget could not cover the fan-out.
    Skipped,
}

/// Run one poll cycle against `source` and publish the result into `state`.
pub async fn poll_cycle<S: CandleSource>(source: &S, state: &AppState) -> CycleOutcome {
    let (symbols, timeframe, params) = {
        let config = state.runtime_config.read();
        (config.symbols.clone(), config.timeframe, config.indicators)
    };

    let weight = KLINES_WEIGHT.saturating_mul(symbols.len() as u32);
    if !state.rate_limits.can_send_request(weight) {
        warn!(symbols = symbols.len(), weight, "poll cycle skipped — rate-limit budget exhausted");
        state.push_error(
            None,
            format!("poll cycle skipped: {weight} request weight would exceed the rate limit"),
        );
        return CycleOutcome::Skipped;
    }

    let limit = u32::try_from(params.required_candles()).unwrap_or(u32::MAX);

    let fetches = symbols.iter().map(|symbol| async move {
        let result = source.fetch_candles(symbol, timeframe, limit).await;
        (symbol, result)
    });
    let results = join_all(fetches).await;

    let mut snapshots = HashMap::with_capacity(results.len());
    let mut failed = 0;

    for (symbol, result) in results {
        let snapshot = match result {
            Ok(candles) => {
                let snapshot = compute_snapshot(&candles, &params);
                debug!(
                    symbol = %symbol,
                    candles = candles.len(),
                    rsi_points = snapshot.rsi.len(),
                    sma_points = snapshot.sma.len(),
                    "snapshot computed"
                );
                snapshot
            }
            Err(e) => {
                failed += 1;
                warn!(symbol = %symbol, interval = %timeframe, error = %e, "candle fetch failed — publishing empty snapshot");
                state.push_error(Some(symbol.as_str()), format!("{e:#}"));
                SymbolSnapshot::empty()
            }
        };
        snapshots.insert(symbol.clone(), snapshot);
    }

    let published = snapshots.len();
    if let Some(previous) = state.published_timeframe().filter(|tf| *tf != timeframe) {
        info!(from = %previous, to = %timeframe, "grid switched timeframe");
    }
    state.publish_cycle(timeframe, snapshots);

    CycleOutcome::Completed { published, failed }
}

/// Poll forever: once per `poll_interval_secs`, plus immediately whenever
/// [`AppState::refresh`] is notified.
pub async fn run_poller<S: CandleSource>(source: S, state: Arc<AppState>) {
    let period = Duration::from_secs(state.runtime_config.read().poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(every_secs = period.as_secs(), "poller starting");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = state.refresh.notified() => {
                debug!("out-of-cycle refresh requested");
                interval.reset();
            }
        }

        let started = std::time::Instant::now();
        match poll_cycle(&source, &state).await {
            CycleOutcome::Completed { published, failed } => {
                info!(
                    published,
                    failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "poll cycle complete"
                );
            }
            CycleOutcome::Skipped => {}
        }
    }
}
