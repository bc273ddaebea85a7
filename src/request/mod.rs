//! Request layer
//!
//! Retrying, timed, rate-limited access to a market data source.

mod client;
mod limiter;

pub use client::RequestClient;
pub use limiter::SlidingWindowLimiter;
