// =============================================================================
// Central Application State — RSI grid service
// =============================================================================
//
// The poller writes here once per cycle; the REST handlers and the WebSocket
// feed only read.  A cycle's snapshots are swapped in as one map so readers
// never see a mix of two cycles or two timeframes.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - tokio::sync::Notify to wake the poller for an out-of-cycle refresh.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;

use crate::binance::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::indicators::{RsiZone, SymbolSnapshot};
use crate::runtime_config::{RuntimeConfig, CONFIG_PATH};
use crate::types::Timeframe;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Symbol the error belongs to, if any.
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// Dashboard payloads
// =============================================================================

/// One grid cell: a symbol's snapshot plus the values the grid highlights.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub symbol: String,
    pub latest_rsi: Option<f64>,
    pub latest_sma: Option<f64>,
    pub zone: Option<RsiZone>,
    #[serde(flatten)]
    pub snapshot: SymbolSnapshot,
}

impl SymbolView {
    fn new(symbol: &str, snapshot: SymbolSnapshot) -> Self {
        let latest_rsi = snapshot.latest_rsi();
        Self {
            symbol: symbol.to_string(),
            latest_rsi,
            latest_sma: snapshot.latest_sma(),
            zone: latest_rsi.map(RsiZone::classify),
            snapshot,
        }
    }
}

/// Full payload served by `GET /api/v1/dashboard` and the WebSocket feed.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    /// Timeframe the published snapshots were computed on; `None` before the
    /// first cycle.
    pub timeframe: Option<Timeframe>,
    /// Timeframe the next cycle will use.
    pub configured_timeframe: Timeframe,
    pub last_cycle_at: Option<String>,
    pub uptime_secs: u64,
    pub rate_limit: RateLimitSnapshot,
    pub symbols: Vec<SymbolView>,
    pub recent_errors: Vec<ErrorRecord>,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Published result of the most recent poll cycle.
#[derive(Debug, Default)]
struct PublishedCycle {
    timeframe: Option<Timeframe>,
    completed_at: Option<DateTime<Utc>>,
    snapshots: HashMap<String, SymbolSnapshot>,
}

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Monotonically increasing version counter, bumped on every published
    /// change.  The WebSocket feed pushes whenever it moves.
    pub state_version: AtomicU64,

    /// Number of open WebSocket connections.
    pub ws_clients: AtomicUsize,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub config_path: PathBuf,
    /// Expected bearer token for mutating endpoints; `None` disables them.
    pub admin_token: Option<String>,

    // ── Market Data ─────────────────────────────────────────────────────
    cycle: RwLock<PublishedCycle>,
    pub rate_limits: Arc<RateLimitTracker>,

    /// Wakes the poller for an immediate cycle (e.g. after a timeframe switch).
    pub refresh: Notify,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    pub fn new(config: RuntimeConfig, rate_limits: Arc<RateLimitTracker>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_clients: AtomicUsize::new(0),

            runtime_config: Arc::new(RwLock::new(config)),
            config_path: PathBuf::from(CONFIG_PATH),
            admin_token: None,

            cycle: RwLock::new(PublishedCycle::default()),
            rate_limits,
            refresh: Notify::new(),

            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Cycle Publication ───────────────────────────────────────────────

    /// Replace every published snapshot with the result of one poll cycle.
    pub fn publish_cycle(&self, timeframe: Timeframe, snapshots: HashMap<String, SymbolSnapshot>) {
        {
            let mut cycle = self.cycle.write();
            cycle.timeframe = Some(timeframe);
            cycle.completed_at = Some(Utc::now());
            cycle.snapshots = snapshots;
        }
        self.increment_version();
    }

    /// Timeframe of the currently published snapshots.
    pub fn published_timeframe(&self) -> Option<Timeframe> {
        self.cycle.read().timeframe
    }

    /// Build the grid cell for `symbol`, or `None` when it is not tracked.
    ///
    /// A tracked symbol with no result yet is reported with the empty
    /// snapshot.
    pub fn symbol_view(&self, symbol: &str) -> Option<SymbolView> {
        let tracked = self
            .runtime_config
            .read()
            .symbols
            .iter()
            .any(|s| s == symbol);
        if !tracked {
            return None;
        }
        let snapshot = self
            .cycle
            .read()
            .snapshots
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        Some(SymbolView::new(symbol, snapshot))
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, symbol: Option<&str>, msg: String) {
        let record = ErrorRecord {
            message: msg,
            symbol: symbol.map(str::to_string),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        let excess = errors.len().saturating_sub(MAX_RECENT_ERRORS);
        errors.drain(..excess);
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the complete dashboard payload, symbols in configured order.
    pub fn build_dashboard(&self) -> DashboardSnapshot {
        let now = Utc::now();
        let (symbols, configured_timeframe) = {
            let config = self.runtime_config.read();
            (config.symbols.clone(), config.timeframe)
        };

        let cycle = self.cycle.read();
        let views = symbols
            .iter()
            .map(|symbol| {
                let snapshot = cycle.snapshots.get(symbol).cloned().unwrap_or_default();
                SymbolView::new(symbol, snapshot)
            })
            .collect();

        DashboardSnapshot {
            state_version: self.current_state_version(),
            server_time: now.timestamp_millis(),
            timeframe: cycle.timeframe,
            configured_timeframe,
            last_cycle_at: cycle.completed_at.map(|t| t.to_rfc3339()),
            uptime_secs: self.start_time.elapsed().as_secs(),
            rate_limit: self.rate_limits.snapshot(),
            symbols: views,
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}
