//! Event publication module
//!
//! What the engine tells the outside world: per-symbol status and portfolio
//! totals for presentation, alert and state-change notifications for the
//! notifier. Nothing here knows how events are rendered.

mod bus;
mod log;

pub use bus::EventBus;
pub use log::LogNotifier;

use crate::alert::AlertFired;
use crate::portfolio::PortfolioTotals;
use crate::quote::Snapshot;
use crate::scheduler::SymbolState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduler state transitions worth notifying about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateChange {
    /// Polling suspended after repeated failures
    Paused { until: DateTime<Utc> },
    /// Polling restarted after a pause
    Resumed,
    /// A tick failed
    Error { message: String },
}

/// Presentation record for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStatus {
    pub symbol: String,
    pub state: SymbolState,
    pub last_snapshot: Option<Snapshot>,
    pub error: Option<String>,
    pub consecutive_failures: u32,
    pub paused_until: Option<DateTime<Utc>>,
}

/// Everything the engine publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CoreEvent {
    SymbolUpdated(SymbolStatus),
    TotalsUpdated(PortfolioTotals),
    AlertFired(AlertFired),
    StateChanged { symbol: String, change: StateChange },
    SymbolRemoved { symbol: String },
}

/// Receiver of alert and scheduler state notifications
pub trait Notifier: Send + Sync {
    /// An alert crossed its threshold
    fn alert_fired(&self, event: &AlertFired);
    /// A symbol paused, resumed or failed a tick
    fn state_changed(&self, symbol: &str, change: &StateChange);
}
