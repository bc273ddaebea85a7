//! Session command implementation

use crate::config::Config;
use crate::market::MarketClock;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

impl SessionArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let clock = MarketClock::new(config.market.clone());
        let status = match self.at {
            Some(at) => clock.status_at(at),
            None => clock.status(),
        };

        println!("Market session: {}", status.session);
        println!("  Evaluated at: {}", status.evaluated_at);
        println!("  Local time:   {}", clock.local_time(status.evaluated_at));
        Ok(())
    }
}
