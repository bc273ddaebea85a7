//! Portfolio totals over cached quotes

use crate::cache::{Cache, CacheCategory};
use crate::quote::Snapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::Instant;

/// Portfolio-level totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    /// Sum of price times quantity
    pub total_value: Decimal,
    /// Sum of change from previous close times quantity
    pub total_change: Decimal,
    /// `total_change / (total_value - total_change) * 100`, 0 when undefined
    pub change_percent: Decimal,
    /// Symbols that contributed a live quote
    pub symbol_count: usize,
}

/// Derives totals from whatever quotes are currently cached
///
/// Symbols without a live quote are left out entirely rather than
/// counted at zero.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    holdings: HashMap<String, Decimal>,
}

impl Aggregator {
    pub fn new(holdings: HashMap<String, Decimal>) -> Self {
        let holdings = holdings
            .into_iter()
            .map(|(symbol, qty)| (symbol.to_uppercase(), qty))
            .collect();
        Self { holdings }
    }

    pub fn set_holding(&mut self, symbol: &str, quantity: Decimal) {
        self.holdings.insert(symbol.to_uppercase(), quantity);
    }

    pub fn remove_holding(&mut self, symbol: &str) -> Option<Decimal> {
        self.holdings.remove(&symbol.to_uppercase())
    }

    /// Held quantity; one unit when no holding is recorded
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.holdings
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    pub fn holdings(&self) -> &HashMap<String, Decimal> {
        &self.holdings
    }

    /// Totals over the given snapshots
    pub fn compute_totals<'a>(
        &self,
        snapshots: impl IntoIterator<Item = &'a Snapshot>,
    ) -> PortfolioTotals {
        let mut totals = PortfolioTotals::default();

        for snapshot in snapshots {
            let qty = self.quantity(&snapshot.symbol);
            let contribution = snapshot.price.checked_mul(qty).and_then(|value| {
                let change = snapshot
                    .price
                    .checked_sub(snapshot.previous_close)?
                    .checked_mul(qty)?;
                Some((
                    totals.total_value.checked_add(value)?,
                    totals.total_change.checked_add(change)?,
                ))
            });
            match contribution {
                Some((value, change)) => {
                    totals.total_value = value;
                    totals.total_change = change;
                    totals.symbol_count += 1;
                }
                None => {
                    tracing::warn!(
                        symbol = %snapshot.symbol,
                        quantity = %qty,
                        "Position value out of range, left out of totals"
                    );
                }
            }
        }

        totals.change_percent = totals
            .total_value
            .checked_sub(totals.total_change)
            .filter(|base| !base.is_zero())
            .and_then(|base| totals.total_change.checked_div(base))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        totals
    }

    /// Totals over the live quotes in `cache`
    pub fn compute_from_cache(&self, cache: &Cache<Snapshot>) -> PortfolioTotals {
        self.compute_from_cache_at(cache, Instant::now())
    }

    pub fn compute_from_cache_at(&self, cache: &Cache<Snapshot>, now: Instant) -> PortfolioTotals {
        self.compute_totals(cache.live_values_at(CacheCategory::Quote, now))
    }
}
