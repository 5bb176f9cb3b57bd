pub mod candle;
pub mod poller;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, CandleSource};
pub use poller::run_poller;
