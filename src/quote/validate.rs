//! Snapshot sanity checks

use super::{FetchError, Snapshot};
use crate::config::ValidationConfig;
use rust_decimal::Decimal;

/// Reject snapshots whose numbers fall outside the configured ranges
pub fn validate_snapshot(snapshot: &Snapshot, config: &ValidationConfig) -> Result<(), FetchError> {
    if snapshot.symbol.trim().is_empty() {
        return Err(FetchError::Validation("empty symbol".to_string()));
    }

    if snapshot.price < config.min_price || snapshot.price > config.max_price {
        return Err(FetchError::Validation(format!(
            "{} price {} outside [{}, {}]",
            snapshot.symbol, snapshot.price, config.min_price, config.max_price
        )));
    }

    if snapshot.previous_close < Decimal::ZERO {
        return Err(FetchError::Validation(format!(
            "{} previous close {} is negative",
            snapshot.symbol, snapshot.previous_close
        )));
    }

    let move_pct = snapshot
        .checked_change_pct()
        .ok_or_else(|| {
            FetchError::Validation(format!(
                "{} change from previous close {} is out of range",
                snapshot.symbol, snapshot.previous_close
            ))
        })?
        .abs();
    if move_pct > config.max_change_pct {
        return Err(FetchError::Validation(format!(
            "{} change {}% exceeds ceiling {}%",
            snapshot.symbol,
            move_pct.round_dp(2),
            config.max_change_pct
        )));
    }

    Ok(())
}
