//! Quote types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Normalized quote for a symbol at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ticker symbol (e.g., "AAPL")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Previous session close
    pub previous_close: Decimal,
    /// Session volume
    pub volume: u64,
    /// Display name of the instrument
    pub name: String,
    /// Provider timestamp; monotonic per symbol
    pub as_of: DateTime<Utc>,
}

impl Snapshot {
    /// Create a snapshot with no volume and the symbol as its name
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        previous_close: Decimal,
        as_of: DateTime<Utc>,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            name: symbol.clone(),
            symbol,
            price,
            previous_close,
            volume: 0,
            as_of,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Absolute change from previous close
    pub fn change(&self) -> Decimal {
        self.price - self.previous_close
    }

    /// Percent change from previous close (0 when there is no close)
    ///
    /// Also 0 when the ratio does not fit in a `Decimal`; validation rejects
    /// such quotes before they are cached.
    pub fn change_pct(&self) -> Decimal {
        self.checked_change_pct().unwrap_or(Decimal::ZERO)
    }

    /// Percent change, `None` on overflow
    pub fn checked_change_pct(&self) -> Option<Decimal> {
        if self.previous_close.is_zero() {
            return Some(Decimal::ZERO);
        }
        self.price
            .checked_sub(self.previous_close)?
            .checked_div(self.previous_close)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }
}

/// Errors produced while fetching a quote
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connectivity failure
    #[error("Network error: {0}")]
    Network(String),
    /// No response within the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Non-2xx response
    #[error("HTTP error (status={status}): {message}")]
    Http { status: u16, message: String },
    /// Malformed payload
    #[error("Parse error: {0}")]
    Parse(String),
    /// Snapshot outside the declared numeric ranges
    #[error("Validation error: {0}")]
    Validation(String),
    /// Local request budget exhausted
    #[error("Rate limited: more than {limit} requests per minute")]
    RateLimited { limit: u32 },
}

impl FetchError {
    /// Transport-level failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_) | FetchError::Timeout(_) | FetchError::Http { .. }
        )
    }

    /// Whether the failure counts toward a symbol's consecutive failures
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, FetchError::RateLimited { .. })
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::Http { .. } => "http",
            FetchError::Parse(_) => "parse",
            FetchError::Validation(_) => "validation",
            FetchError::RateLimited { .. } => "rate_limited",
        }
    }
}
