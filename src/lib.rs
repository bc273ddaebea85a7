//! quote-sync: real-time quote synchronization engine
//!
//! This library provides the core components for:
//! - Per-symbol polling with session-aware intervals, backoff and auto-pause
//! - An expiring, size-bounded quote cache with stale-write rejection
//! - Retrying, rate-limited requests against a quote source
//! - One-shot price alerts
//! - Portfolio totals over cached quotes
//! - Market session clock
//! - Key-value persistence of user state
//! - Full observability stack

pub mod alert;
pub mod cache;
pub mod cli;
pub mod config;
pub mod events;
pub mod market;
pub mod portfolio;
pub mod quote;
pub mod request;
pub mod scheduler;
pub mod store;
pub mod telemetry;
