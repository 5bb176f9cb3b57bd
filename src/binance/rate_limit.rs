// =============================================================================
// Rate-Limit Tracker — keeps the poller under Binance's request-weight budget
// =============================================================================
//
// Binance allows 1200 request weight per minute per IP; we hard-cap ourselves
// at 1000.  Every klines response carries `X-MBX-USED-WEIGHT-1M`, which the
// client records here.  A reading older than one minute belongs to a window
// that has already rolled over and counts as zero.
// =============================================================================

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to start another fan-out.
const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;
/// Length of the exchange's weight window.
const WEIGHT_WINDOW_MS: i64 = 60_000;

/// Request weight of one `GET /api/v3/klines` call.
pub const KLINES_WEIGHT: u32 = 2;

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    /// Wall-clock time (ms) of the last header reading.
    observed_at_ms: AtomicI64,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            observed_at_ms: AtomicI64::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // Header-based updates
    // -------------------------------------------------------------------------

    /// Update the weight counter from the HTTP response headers returned by
    /// Binance.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(weight) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok())
        else {
            return;
        };
        self.record_weight(weight, Utc::now().timestamp_millis());
    }

    fn record_weight(&self, weight: u32, now_ms: i64) {
        let prev = self.weight_at(now_ms);
        self.used_weight_1m.store(weight, Ordering::Relaxed);
        self.observed_at_ms.store(now_ms, Ordering::Relaxed);

        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    // -------------------------------------------------------------------------
    // Pre-flight checks
    // -------------------------------------------------------------------------

    /// Return `true` if `weight` more request weight fits under the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_at(weight, Utc::now().timestamp_millis())
    }

    fn can_send_at(&self, weight: u32, now_ms: i64) -> bool {
        let current = self.weight_at(now_ms);
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed rate-limit"
            );
        }
        allowed
    }

    fn weight_at(&self, now_ms: i64) -> u32 {
        let observed = self.observed_at_ms.load(Ordering::Relaxed);
        if now_ms - observed >= WEIGHT_WINDOW_MS {
            0
        } else {
            self.used_weight_1m.load(Ordering::Relaxed)
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.weight_at(Utc::now().timestamp_millis()),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("observed_at_ms", &self.observed_at_ms.load(Ordering::Relaxed))
            .finish()
    }
}
