//! Scheduler types

use crate::alert::AlertError;
use crate::config::SchedulerConfig;
use crate::events::SymbolStatus;
use crate::market::MarketSession;
use crate::quote::{FetchError, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Polling state of a tracked symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolState {
    /// Waiting for its next tick
    Idle,
    /// Fetch outstanding
    Loading,
    /// Last tick failed
    Error,
    /// Suspended after repeated failures
    Paused,
}

/// Per-symbol scheduling record, owned by the scheduler task
#[derive(Debug, Clone)]
pub struct TrackedSymbol {
    pub id: String,
    pub state: SymbolState,
    /// Current polling interval
    pub interval: Duration,
    pub consecutive_failures: u32,
    pub paused_until: Option<Instant>,
    /// Wall-clock form of `paused_until`, for presentation
    pub paused_until_utc: Option<DateTime<Utc>>,
    pub last_snapshot: Option<Snapshot>,
    pub last_error: Option<FetchError>,
    pub in_flight: bool,
    /// Bumped on every re-arm; queue entries from older generations are ignored
    pub generation: u64,
    /// Identity of this tracking; a symbol removed and re-added gets a new one
    pub track_id: u64,
    /// A tick came due while ticks were suspended
    pub held: bool,
}

impl TrackedSymbol {
    pub fn new(id: String, track_id: u64, interval: Duration) -> Self {
        Self {
            id,
            state: SymbolState::Idle,
            interval,
            consecutive_failures: 0,
            paused_until: None,
            paused_until_utc: None,
            last_snapshot: None,
            last_error: None,
            in_flight: false,
            generation: 0,
            track_id,
            held: false,
        }
    }

    /// Successful tick: failures reset, interval back to the adaptive base
    pub fn record_success(&mut self, interval: Duration) {
        self.state = SymbolState::Idle;
        self.consecutive_failures = 0;
        self.interval = interval;
        self.last_error = None;
    }

    /// Failed tick; returns true when the symbol should now pause
    ///
    /// Failures that do not count (rate limiting) leave the counter and the
    /// interval untouched.
    pub fn record_failure(&mut self, error: FetchError, config: &SchedulerConfig) -> bool {
        self.state = SymbolState::Error;
        let counts = error.counts_as_failure();
        self.last_error = Some(error);
        if !counts {
            return false;
        }

        self.consecutive_failures += 1;
        self.interval = backoff_interval(self.interval, config);
        config.auto_pause_on_error && self.consecutive_failures >= config.max_retries.max(1)
    }

    pub fn pause(&mut self, until: Instant, until_utc: DateTime<Utc>) {
        self.state = SymbolState::Paused;
        self.paused_until = Some(until);
        self.paused_until_utc = Some(until_utc);
    }

    /// Leave PAUSED: failures cleared, interval back to the adaptive base
    pub fn resume(&mut self, interval: Duration) {
        self.state = SymbolState::Idle;
        self.consecutive_failures = 0;
        self.interval = interval;
        self.paused_until = None;
        self.paused_until_utc = None;
    }

    pub fn status(&self) -> SymbolStatus {
        SymbolStatus {
            symbol: self.id.clone(),
            state: self.state,
            last_snapshot: self.last_snapshot.clone(),
            error: self.last_error.as_ref().map(|e| e.to_string()),
            consecutive_failures: self.consecutive_failures,
            paused_until: self.paused_until_utc,
        }
    }
}

/// Base polling interval for a session, clamped to the configured bounds
pub fn adaptive_interval(session: MarketSession, config: &SchedulerConfig) -> Duration {
    let base = if session.is_open() {
        config.market_hours_interval_ms
    } else {
        config.after_hours_interval_ms
    };
    Duration::from_millis(base).clamp(config.min_interval(), config.max_interval())
}

/// Next interval after a counted failure: multiplied, capped at the maximum
pub fn backoff_interval(current: Duration, config: &SchedulerConfig) -> Duration {
    let multiplier = config.backoff_multiplier.max(1.0);
    let next = Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
        .unwrap_or(config.max_interval());
    next.clamp(config.min_interval(), config.max_interval())
}

/// Normalized symbol, or `None` when blank
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    (!symbol.is_empty()).then(|| symbol.to_uppercase())
}

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Symbol not tracked: {0}")]
    NotTracked(String),

    #[error("Symbol not paused: {0}")]
    NotPaused(String),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error("Scheduler has shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            market_hours_interval_ms: 15_000,
            after_hours_interval_ms: 60_000,
            min_interval_ms: 5_000,
            max_interval_ms: 300_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_adaptive_interval_by_session() {
        let config = config();
        assert_eq!(
            adaptive_interval(MarketSession::Open, &config),
            Duration::from_secs(15)
        );
        for session in [
            MarketSession::PreMarket,
            MarketSession::AfterHours,
            MarketSession::Closed,
            MarketSession::Holiday,
            MarketSession::Weekend,
        ] {
            assert_eq!(adaptive_interval(session, &config), Duration::from_secs(60));
        }
    }

    #[test]
    fn test_adaptive_interval_clamped() {
        let config = SchedulerConfig {
            market_hours_interval_ms: 1_000,
            after_hours_interval_ms: 900_000,
            ..config()
        };
        assert_eq!(
            adaptive_interval(MarketSession::Open, &config),
            Duration::from_secs(5)
        );
        assert_eq!(
            adaptive_interval(MarketSession::Closed, &config),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = config();
        let mut interval = Duration::from_secs(60);
        let mut seen = Vec::new();
        for _ in 0..4 {
            interval = backoff_interval(interval, &config);
            seen.push(interval.as_secs());
        }
        assert_eq!(seen, vec![120, 240, 300, 300]);
    }

    #[test]
    fn test_record_failure_pauses_at_max_retries() {
        let config = config();
        let mut tracked = TrackedSymbol::new("AAPL".into(), 1, Duration::from_secs(15));

        assert!(!tracked.record_failure(FetchError::Network("down".into()), &config));
        assert!(!tracked.record_failure(FetchError::Network("down".into()), &config));
        assert!(tracked.record_failure(FetchError::Network("down".into()), &config));
        assert_eq!(tracked.consecutive_failures, 3);
        assert_eq!(tracked.interval, Duration::from_secs(120));

        tracked.resume(Duration::from_secs(15));
        assert_eq!(tracked.state, SymbolState::Idle);
        assert_eq!(tracked.consecutive_failures, 0);
        assert_eq!(tracked.interval, Duration::from_secs(15));
    }

    #[test]
    fn test_rate_limited_is_not_counted() {
        let config = config();
        let mut tracked = TrackedSymbol::new("AAPL".into(), 1, Duration::from_secs(15));
        for _ in 0..5 {
            assert!(!tracked.record_failure(FetchError::RateLimited { limit: 60 }, &config));
        }
        assert_eq!(tracked.consecutive_failures, 0);
        assert_eq!(tracked.interval, Duration::from_secs(15));
        assert_eq!(tracked.state, SymbolState::Error);
    }

    #[test]
    fn test_no_pause_when_disabled() {
        let config = SchedulerConfig {
            auto_pause_on_error: false,
            ..config()
        };
        let mut tracked = TrackedSymbol::new("AAPL".into(), 1, Duration::from_secs(15));
        for _ in 0..10 {
            assert!(!tracked.record_failure(FetchError::Parse("bad".into()), &config));
        }
        assert_eq!(tracked.consecutive_failures, 10);
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("   "), None);
    }
}
