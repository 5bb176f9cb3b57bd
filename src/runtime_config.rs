// =============================================================================
// Runtime Configuration — dashboard settings with atomic save
// =============================================================================
//
// Everything the poller and the indicator engine need: the watched symbols,
// the active timeframe, the indicator periods and the poll cadence.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::MAX_KLINES_LIMIT;
use crate::indicators::IndicatorParams;
use crate::types::Timeframe;

/// File the service loads on startup and rewrites on changes.
pub const CONFIG_PATH: &str = "runtime_config.json";

/// Stock watch list.  Contains a few repeats; [`default_symbols`] dedupes it.
const RAW_DEFAULT_SYMBOLS: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "PAXGUSDT", "BNBUSDT", "SOLUSDT", "ADAUSDT",
    "XRPUSDT", "DOTUSDT", "DOGEUSDT", "AVAXUSDT", "POLUSDT",
    "LINKUSDT", "ATOMUSDT", "UNIUSDT", "FILUSDT", "LTCUSDT",
    "BCHUSDT", "XLMUSDT", "VETUSDT", "THETAUSDT", "AXSUSDT",
    "ETCUSDT", "SEIUSDT", "XTZUSDT", "ALGOUSDT", "SANDUSDT",
    "MANAUSDT", "GALAUSDT", "APEUSDT", "NEARUSDT", "FLOWUSDT",
    "GRTUSDT", "AAVEUSDT", "CHZUSDT", "ENJUSDT", "IOTXUSDT",
    "KAVAUSDT", "KSMUSDT", "LRCUSDT", "ONEUSDT", "QTUMUSDT",
    "RUNEUSDT", "SCRTUSDT", "SNXUSDT", "STXUSDT", "SUSHIUSDT",
    "ZECUSDT", "ZILUSDT", "ZRXUSDT", "ICPUSDT", "ARUSDT",
    "CELOUSDT", "COMPUSDT", "CRVUSDT", "DASHUSDT", "DYDXUSDT",
    "EGLDUSDT", "ENSUSDT", "IMXUSDT", "INJUSDT", "IOSTUSDT",
    "JASMYUSDT", "PHBUSDT", "LDOUSDT", "ONDOUSDT", "MKRUSDT",
    "JTOUSDT", "OMNIUSDT", "OPUSDT", "PEOPLEUSDT", "PERPUSDT",
    "RENUSDT", "ROSEUSDT", "RSRUSDT", "RVNUSDT", "SKLUSDT",
    "STORJUSDT", "TRXUSDT", "WIFUSDT", "YFIUSDT", "1INCHUSDT",
    "OMUSDT", "HYPERUSDT", "CFXUSDT", "STRKUSDT", "BANDUSDT",
    "BATUSDT", "BIGTIMEUSDT", "CELRUSDT", "COTIUSDT", "CVCUSDT",
    "DENTUSDT", "PYTHUSDT", "HOTUSDT", "ICXUSDT", "API3USDT",
    "KNCUSDT", "MAGICUSDT", "SAGAUSDT", "TRUMPUSDT", "MASKUSDT",
    "NKNUSDT", "OGNUSDT", "ONTUSDT", "POWRUSDT", "TAOUSDT",
    "PENDLEUSDT", "SLPUSDT", "BEARUSDT", "SXPUSDT", "HBARUSDT",
    "UMAUSDT", "WOOUSDT", "TRBUSDT", "REZUSDT", "ANKRUSDT",
    "ARPAUSDT", "BELUSDT", "C98USDT", "CHRUSDT", "CTKUSDT",
    "SOLVUSDT", "JUPUSDT", "ORDIUSDT", "FLMUSDT", "FORTHUSDT",
    "SOLETH", "TWTUSDT", "ETHBTC", "HIVEUSDT", "JSTUSDT",
    "LPTUSDT", "WLFIUSDT", "MINAUSDT", "MOVRUSDT", "NEOUSDT",
    "NMRUSDT", "OXTUSDT", "BICOUSDT", "SAHARAUSDT", "QNTUSDT",
    "QUICKUSDT", "TONUSDT", "TIAUSDT", "RLCUSDT", "WIFUSDT",
    "SPELLUSDT", "ACHUSDT", "SUPERUSDT", "SYSUSDT", "FORMUSDT",
    "TLMUSDT", "TWTUSDT", "XVGUSDT",
];

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

/// The stock watch list with repeats removed, first occurrence wins.
pub fn default_symbols() -> Vec<String> {
    normalize_symbols(RAW_DEFAULT_SYMBOLS.iter().copied())
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Trim, upper-case and dedupe symbols while keeping their first-seen order.
pub fn normalize_symbols<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the dashboard service.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Trading pairs shown on the dashboard, in display order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline interval every symbol is computed on.
    #[serde(default)]
    pub timeframe: Timeframe,

    /// RSI / SMA periods and the number of points published per series.
    #[serde(default)]
    pub indicators: IndicatorParams,

    /// Seconds between two poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframe: Timeframe::default(),
            indicators: IndicatorParams::default(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.symbols.len(),
            timeframe = %config.timeframe,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Reject settings the engine or poller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            anyhow::bail!("symbol list is empty");
        }
        if self.indicators.rsi_period == 0 {
            anyhow::bail!("rsi_period must be at least 1");
        }
        if self.indicators.sma_period == 0 {
            anyhow::bail!("sma_period must be at least 1");
        }
        if self.indicators.display_limit == 0 {
            anyhow::bail!("display_limit must be at least 1");
        }
        let required = self.indicators.required_candles();
        if required > MAX_KLINES_LIMIT as usize {
            anyhow::bail!(
                "display_limit + rsi_period + 1 = {required} exceeds the {MAX_KLINES_LIMIT} candle request limit"
            );
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }
}
