//! Status command implementation

use crate::config::Config;
use crate::store::{FileStore, Persistence};
use std::sync::Arc;

/// Print persisted symbols, holdings and alerts
pub fn show_status(config: &Config) -> anyhow::Result<()> {
    println!("quote-sync status");

    let Some(path) = &config.store.path else {
        println!("  Store: none configured (state is not persisted)");
        return Ok(());
    };

    let persistence = Persistence::new(Arc::new(FileStore::open(path)?), config.store.prefix.clone());
    println!("  Store: {}", path.display());

    let symbols = persistence.load_symbols()?;
    println!("  Symbols ({}): {}", symbols.len(), symbols.join(", "));

    let holdings = persistence.load_holdings()?;
    let mut holdings: Vec<_> = holdings.into_iter().collect();
    holdings.sort();
    for (symbol, quantity) in holdings {
        println!("  Holding: {symbol} x {quantity}");
    }

    let alerts = persistence.load_alerts()?;
    println!("  Alerts ({}):", alerts.len());
    for alert in alerts {
        let state = if alert.triggered { "TRIGGERED" } else { "pending" };
        println!(
            "    {} {} {} {} [{}]",
            alert.id, alert.symbol, alert.direction, alert.threshold_price, state
        );
    }

    let prefs = persistence.load_preferences()?;
    println!(
        "  Display: {} with {} decimals",
        prefs.currency, prefs.decimals
    );
    Ok(())
}
