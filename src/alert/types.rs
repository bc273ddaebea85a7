//! Alert types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Alert identifier
pub type AlertId = Uuid;

/// Condition an alert watches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Price at or above the threshold
    Above,
    /// Price at or below the threshold
    Below,
    /// Absolute percent move since creation at or above the threshold
    Change,
}

impl std::fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertDirection::Above => f.write_str("above"),
            AlertDirection::Below => f.write_str("below"),
            AlertDirection::Change => f.write_str("change"),
        }
    }
}

impl std::str::FromStr for AlertDirection {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "above" => Ok(AlertDirection::Above),
            "below" => Ok(AlertDirection::Below),
            "change" => Ok(AlertDirection::Change),
            other => Err(AlertError::UnknownDirection(other.to_string())),
        }
    }
}

/// A one-shot price alert
///
/// For `Change` alerts `threshold_price` is a percentage and
/// `created_price` the reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub symbol: String,
    pub threshold_price: Decimal,
    pub direction: AlertDirection,
    pub created_at: DateTime<Utc>,
    /// Latest known price at creation; set by the first quote when unknown
    pub created_price: Option<Decimal>,
    pub triggered: bool,
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub triggered_price: Option<Decimal>,
}

impl Alert {
    /// Create an untriggered alert
    pub fn new(
        symbol: &str,
        threshold_price: Decimal,
        direction: AlertDirection,
        created_price: Option<Decimal>,
    ) -> Result<Self, AlertError> {
        if threshold_price <= Decimal::ZERO {
            return Err(AlertError::InvalidThreshold(threshold_price));
        }
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AlertError::EmptySymbol);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            symbol,
            threshold_price,
            direction,
            created_at: Utc::now(),
            created_price,
            triggered: false,
            triggered_at: None,
            triggered_price: None,
        })
    }

    /// Whether `price` satisfies the alert condition
    pub fn is_met_by(&self, price: Decimal) -> bool {
        match self.direction {
            AlertDirection::Above => price >= self.threshold_price,
            AlertDirection::Below => price <= self.threshold_price,
            AlertDirection::Change => match self.created_price {
                Some(base) if !base.is_zero() => price
                    .checked_sub(base)
                    .and_then(|diff| diff.checked_div(base))
                    .and_then(|ratio| ratio.abs().checked_mul(Decimal::ONE_HUNDRED))
                    // a move too large to represent clears any threshold
                    .map_or(true, |pct| pct >= self.threshold_price),
                _ => false,
            },
        }
    }
}

/// Notification emitted when an alert fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertFired {
    pub alert_id: AlertId,
    pub symbol: String,
    pub threshold_price: Decimal,
    pub price: Decimal,
    pub direction: AlertDirection,
    pub fired_at: DateTime<Utc>,
}

/// Alert management errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    /// Threshold must be positive
    #[error("Invalid alert threshold: {0}")]
    InvalidThreshold(Decimal),
    #[error("Alert symbol is empty")]
    EmptySymbol,
    #[error("Unknown alert direction: {0}")]
    UnknownDirection(String),
    #[error("Alert not found: {0}")]
    NotFound(AlertId),
    /// Only fired alerts can be acknowledged
    #[error("Alert has not triggered: {0}")]
    NotTriggered(AlertId),
}
