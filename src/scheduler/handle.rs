//! Client handle for the scheduler task

use super::types::SchedulerError;
use crate::alert::{Alert, AlertDirection, AlertId};
use crate::cache::CacheStats;
use crate::events::{CoreEvent, EventBus, SymbolStatus};
use crate::market::MarketStatus;
use crate::portfolio::PortfolioTotals;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, oneshot};

type Reply<T> = oneshot::Sender<T>;

/// Requests processed by the scheduler task, in arrival order
#[derive(Debug)]
pub(super) enum Command {
    Track {
        symbol: String,
        reply: Reply<Result<SymbolStatus, SchedulerError>>,
    },
    Untrack {
        symbol: String,
        reply: Reply<Result<(), SchedulerError>>,
    },
    Refresh {
        symbol: String,
        reply: Reply<Result<bool, SchedulerError>>,
    },
    Resume {
        symbol: String,
        reply: Reply<Result<(), SchedulerError>>,
    },
    SetVisible {
        visible: bool,
        reply: Reply<bool>,
    },
    ResumeAll {
        reply: Reply<()>,
    },
    AddAlert {
        symbol: String,
        threshold: Decimal,
        direction: AlertDirection,
        reply: Reply<Result<Alert, SchedulerError>>,
    },
    RemoveAlert {
        id: AlertId,
        reply: Reply<Result<Alert, SchedulerError>>,
    },
    AcknowledgeAlert {
        id: AlertId,
        reply: Reply<Result<Alert, SchedulerError>>,
    },
    Alerts {
        reply: Reply<Vec<Alert>>,
    },
    SetHolding {
        symbol: String,
        quantity: Option<Decimal>,
        reply: Reply<Result<PortfolioTotals, SchedulerError>>,
    },
    Totals {
        reply: Reply<PortfolioTotals>,
    },
    Status {
        reply: Reply<Vec<SymbolStatus>>,
    },
    MarketStatus {
        reply: Reply<MarketStatus>,
    },
    CacheStats {
        reply: Reply<CacheStats>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Cloneable handle to a running scheduler
///
/// Every call is a message to the scheduler task; once the task has stopped
/// calls fail with [`SchedulerError::Closed`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    bus: EventBus,
}

impl SchedulerHandle {
    pub(super) fn new(tx: mpsc::Sender<Command>, bus: EventBus) -> Self {
        Self { tx, bus }
    }

    /// Subscribe to status, totals, alert and state events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.bus.subscribe()
    }

    /// Start polling a symbol; the first fetch is issued immediately
    ///
    /// Tracking an already-tracked symbol returns its current status.
    pub async fn track(&self, symbol: &str) -> Result<SymbolStatus, SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::Track { symbol, reply }).await?
    }

    /// Stop polling a symbol and drop its cached quote
    pub async fn untrack(&self, symbol: &str) -> Result<(), SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::Untrack { symbol, reply }).await?
    }

    /// Fetch now; `false` when a fetch is already outstanding or the symbol is paused
    pub async fn refresh(&self, symbol: &str) -> Result<bool, SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::Refresh { symbol, reply }).await?
    }

    /// Lift an automatic pause before it expires
    pub async fn resume(&self, symbol: &str) -> Result<(), SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::Resume { symbol, reply }).await?
    }

    /// Report host visibility; returns whether ticks are now suspended
    pub async fn set_visible(&self, visible: bool) -> Result<bool, SchedulerError> {
        self.request(|reply| Command::SetVisible { visible, reply })
            .await
    }

    /// Lift visibility suspension and every automatic pause
    pub async fn resume_all(&self) -> Result<(), SchedulerError> {
        self.request(|reply| Command::ResumeAll { reply }).await
    }

    /// Create an alert; `change` alerts use the cached price as baseline
    pub async fn add_alert(
        &self,
        symbol: &str,
        threshold: Decimal,
        direction: AlertDirection,
    ) -> Result<Alert, SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::AddAlert {
            symbol,
            threshold,
            direction,
            reply,
        })
        .await?
    }

    pub async fn remove_alert(&self, id: AlertId) -> Result<Alert, SchedulerError> {
        self.request(|reply| Command::RemoveAlert { id, reply })
            .await?
    }

    /// Dismiss a fired alert
    pub async fn acknowledge_alert(&self, id: AlertId) -> Result<Alert, SchedulerError> {
        self.request(|reply| Command::AcknowledgeAlert { id, reply })
            .await?
    }

    pub async fn alerts(&self) -> Result<Vec<Alert>, SchedulerError> {
        self.request(|reply| Command::Alerts { reply }).await
    }

    /// Set the held quantity for a symbol, or clear it with `None`
    pub async fn set_holding(
        &self,
        symbol: &str,
        quantity: Option<Decimal>,
    ) -> Result<PortfolioTotals, SchedulerError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::SetHolding {
            symbol,
            quantity,
            reply,
        })
        .await?
    }

    pub async fn totals(&self) -> Result<PortfolioTotals, SchedulerError> {
        self.request(|reply| Command::Totals { reply }).await
    }

    /// Status of every tracked symbol, ordered by symbol
    pub async fn status(&self) -> Result<Vec<SymbolStatus>, SchedulerError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn symbol_status(&self, symbol: &str) -> Result<SymbolStatus, SchedulerError> {
        let wanted = symbol.trim().to_uppercase();
        self.status()
            .await?
            .into_iter()
            .find(|s| s.symbol == wanted)
            .ok_or(SchedulerError::NotTracked(wanted))
    }

    pub async fn market_status(&self) -> Result<MarketStatus, SchedulerError> {
        self.request(|reply| Command::MarketStatus { reply }).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, SchedulerError> {
        self.request(|reply| Command::CacheStats { reply }).await
    }

    /// Stop the scheduler task; in-flight fetches are abandoned
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }
}
