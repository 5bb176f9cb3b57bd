pub mod client;
pub mod rate_limit;

pub use client::{BinanceClient, MAX_KLINES_LIMIT};
pub use rate_limit::{RateLimitTracker, KLINES_WEIGHT};
