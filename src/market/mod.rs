//! Market clock module
//!
//! Maps wall-clock time to a trading session (open, pre-market, after hours,
//! closed, holiday, weekend) for the configured exchange calendar.

mod clock;

pub use clock::MarketClock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading session at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    /// Regular trading hours
    Open,
    /// Extended hours before the open
    PreMarket,
    /// Extended hours after the close
    AfterHours,
    /// Trading day, outside every window
    Closed,
    /// Listed exchange holiday
    Holiday,
    /// Non-trading weekday
    Weekend,
}

impl MarketSession {
    /// Regular session only; extended hours do not count
    pub fn is_open(&self) -> bool {
        *self == MarketSession::Open
    }
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MarketSession::Open => "OPEN",
            MarketSession::PreMarket => "PRE_MARKET",
            MarketSession::AfterHours => "AFTER_HOURS",
            MarketSession::Closed => "CLOSED",
            MarketSession::Holiday => "HOLIDAY",
            MarketSession::Weekend => "WEEKEND",
        };
        f.write_str(label)
    }
}

/// Market status as computed on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatus {
    pub session: MarketSession,
    /// Instant the session was evaluated for
    pub evaluated_at: DateTime<Utc>,
}

/// Source of the current trading session
///
/// The scheduler only needs "what session is it now"; tests and offline
/// hosts can substitute a fixed answer.
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> MarketSession;
}

/// Session provider that always reports the same session
#[derive(Debug, Clone, Copy)]
pub struct FixedSession(pub MarketSession);

impl SessionProvider for FixedSession {
    fn current_session(&self) -> MarketSession {
        self.0
    }
}
