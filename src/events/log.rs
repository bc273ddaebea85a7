//! Notifier that writes to the log

use super::{Notifier, StateChange};
use crate::alert::AlertFired;

/// Logs every notification through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert_fired(&self, event: &AlertFired) {
        tracing::warn!(
            symbol = %event.symbol,
            direction = %event.direction,
            threshold = %event.threshold_price,
            price = %event.price,
            "ALERT"
        );
    }

    fn state_changed(&self, symbol: &str, change: &StateChange) {
        match change {
            StateChange::Paused { until } => {
                tracing::warn!(symbol, %until, "Polling paused after repeated failures")
            }
            StateChange::Resumed => tracing::info!(symbol, "Polling resumed"),
            StateChange::Error { message } => {
                tracing::warn!(symbol, error = %message, "Tick failed")
            }
        }
    }
}
