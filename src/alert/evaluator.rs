//! One-shot alert evaluation

use super::types::{Alert, AlertDirection, AlertError, AlertFired, AlertId};
use crate::quote::Snapshot;
use chrono::Utc;
use rust_decimal::Decimal;

/// Holds user alerts and fires them against accepted snapshots
#[derive(Debug, Default)]
pub struct AlertEvaluator {
    alerts: Vec<Alert>,
    /// Set whenever alert state changes and needs persisting
    dirty: bool,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore previously persisted alerts
    pub fn from_alerts(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            dirty: false,
        }
    }

    /// Create and register an alert
    pub fn create(
        &mut self,
        symbol: &str,
        threshold_price: Decimal,
        direction: AlertDirection,
        created_price: Option<Decimal>,
    ) -> Result<Alert, AlertError> {
        let alert = Alert::new(symbol, threshold_price, direction, created_price)?;
        self.alerts.push(alert.clone());
        self.dirty = true;
        Ok(alert)
    }

    pub fn remove(&mut self, id: AlertId) -> Result<Alert, AlertError> {
        let idx = self
            .alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or(AlertError::NotFound(id))?;
        self.dirty = true;
        Ok(self.alerts.remove(idx))
    }

    /// Dismiss a fired alert
    pub fn acknowledge(&mut self, id: AlertId) -> Result<Alert, AlertError> {
        let alert = self
            .alerts
            .iter()
            .find(|a| a.id == id)
            .ok_or(AlertError::NotFound(id))?;
        if !alert.triggered {
            return Err(AlertError::NotTriggered(id));
        }
        self.remove(id)
    }

    /// Evaluate every pending alert for the snapshot's symbol
    ///
    /// Triggered alerts are skipped, so evaluating the same snapshot twice
    /// fires nothing the second time.
    pub fn evaluate(&mut self, snapshot: &Snapshot) -> Vec<AlertFired> {
        let mut fired = Vec::new();

        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| !a.triggered && a.symbol == snapshot.symbol)
        {
            if alert.direction == AlertDirection::Change && alert.created_price.is_none() {
                alert.created_price = Some(snapshot.price);
                self.dirty = true;
                continue;
            }

            if !alert.is_met_by(snapshot.price) {
                continue;
            }

            alert.triggered = true;
            alert.triggered_at = Some(Utc::now());
            alert.triggered_price = Some(snapshot.price);
            self.dirty = true;

            tracing::info!(
                symbol = %alert.symbol,
                direction = %alert.direction,
                threshold = %alert.threshold_price,
                price = %snapshot.price,
                "Alert fired"
            );

            fired.push(AlertFired {
                alert_id: alert.id,
                symbol: alert.symbol.clone(),
                threshold_price: alert.threshold_price,
                price: snapshot.price,
                direction: alert.direction,
                fired_at: Utc::now(),
            });
        }

        fired
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Alerts that can still fire
    pub fn pending_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.triggered).count()
    }

    /// Returns and clears the pending-persist flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
