//! Polling scheduler module
//!
//! Polls each tracked symbol on an interval that adapts to the market
//! session, backs off on failure and pauses a symbol after repeated
//! failures. Accepted quotes flow into the cache, the alert evaluator and
//! the portfolio aggregator.

mod engine;
mod handle;
mod queue;
mod types;

pub use engine::Scheduler;
pub use handle::SchedulerHandle;
pub use queue::{DueEntry, DueKind, DueQueue};
pub use types::{
    adaptive_interval, backoff_interval, normalize_symbol, SchedulerError, SymbolState,
    TrackedSymbol,
};
