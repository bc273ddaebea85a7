//! Run command implementation

use crate::config::Config;
use crate::events::{CoreEvent, LogNotifier};
use crate::market::MarketClock;
use crate::quote::HttpQuoteSource;
use crate::request::RequestClient;
use crate::scheduler::{Scheduler, SymbolState};
use crate::store::{FileStore, Persistence};
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Symbols to track in addition to the configured watchlist
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Print every event as a JSON line
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let source = HttpQuoteSource::new(config.source.clone())?;
        let client = Arc::new(RequestClient::new(
            source,
            config.request.clone(),
            config.validation.clone(),
        ));
        let clock = Arc::new(MarketClock::new(config.market.clone()));

        let mut scheduler = Scheduler::new(
            config.scheduler.clone(),
            config.cache.clone(),
            client,
            clock,
        )
        .with_notifier(Arc::new(LogNotifier))
        .with_holdings(config.watchlist.holdings.clone());

        if let Some(path) = &config.store.path {
            let store = FileStore::open(path)?;
            tracing::info!(path = %path.display(), "Using file store");
            scheduler = scheduler.with_persistence(Persistence::new(
                Arc::new(store),
                config.store.prefix.clone(),
            ));
        }

        let (handle, task) = scheduler.spawn();
        let mut events = handle.subscribe();

        for symbol in config.watchlist.symbols.iter().chain(&self.symbols) {
            if let Err(e) = handle.track(symbol).await {
                tracing::warn!(symbol = %symbol, error = %e, "Cannot track symbol");
            }
        }

        let market = handle.market_status().await?;
        tracing::info!(session = %market.session, "Polling started, Ctrl-C to stop");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.print_event(&event)?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event output lagging");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        handle.shutdown().await?;
        task.await?;
        Ok(())
    }

    fn print_event(&self, event: &CoreEvent) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        match event {
            CoreEvent::SymbolUpdated(status) if status.state == SymbolState::Idle => {
                if let Some(snapshot) = &status.last_snapshot {
                    println!(
                        "{:<8} {:>12} {:>+10} ({:+.2}%)",
                        snapshot.symbol,
                        snapshot.price,
                        snapshot.change(),
                        snapshot.change_pct()
                    );
                }
            }
            CoreEvent::TotalsUpdated(totals) => {
                println!(
                    "{:<8} {:>12} {:>+10} ({:+.2}%)",
                    "TOTAL", totals.total_value, totals.total_change, totals.change_percent
                );
            }
            _ => {}
        }
        Ok(())
    }
}
