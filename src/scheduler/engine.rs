//! Scheduler task
//!
//! One task owns every tracked symbol, the quote cache, the alert evaluator
//! and the aggregator. Fetches run concurrently inside the same task as a
//! `FuturesUnordered`, so no state is shared across threads.

use super::handle::{Command, SchedulerHandle};
use super::queue::{DueKind, DueQueue};
use super::types::{adaptive_interval, normalize_symbol, SchedulerError, SymbolState, TrackedSymbol};
use crate::alert::{Alert, AlertDirection, AlertEvaluator, AlertFired, AlertId};
use crate::cache::{Cache, CacheError, CacheKey};
use crate::config::{CacheConfig, SchedulerConfig};
use crate::events::{CoreEvent, EventBus, Notifier, StateChange, SymbolStatus};
use crate::market::{MarketStatus, SessionProvider};
use crate::portfolio::{Aggregator, PortfolioTotals};
use crate::quote::{FetchError, MarketDataSource, Snapshot};
use crate::request::RequestClient;
use crate::store::{Persistence, StoreError};
use crate::telemetry::{
    increment, increment_by, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

/// Result of one fetch, tagged with the tracking it was issued for
struct FetchOutcome {
    symbol: String,
    track_id: u64,
    result: Result<Snapshot, FetchError>,
}

/// Polling scheduler
///
/// Build with [`Scheduler::new`] and the `with_*` methods, then
/// [`spawn`](Scheduler::spawn) it and drive it through the returned
/// [`SchedulerHandle`].
pub struct Scheduler<S> {
    config: SchedulerConfig,
    client: Arc<RequestClient<S>>,
    session: Arc<dyn SessionProvider>,
    cache: Cache<Snapshot>,
    alerts: AlertEvaluator,
    aggregator: Aggregator,
    bus: EventBus,
    notifiers: Vec<Arc<dyn Notifier>>,
    persistence: Option<Persistence>,

    symbols: BTreeMap<String, TrackedSymbol>,
    queue: DueQueue,
    in_flight: FuturesUnordered<BoxFuture<'static, FetchOutcome>>,
    /// Symbols with a fetch outstanding, including fetches issued before an untrack
    outstanding: HashSet<String>,
    next_track_id: u64,
    next_generation: u64,
    /// Ticks are held instead of fetched
    suspended: bool,
    visible: bool,
    /// Cache removals already reported to metrics
    reported_removals: u64,
}

impl<S: MarketDataSource + 'static> Scheduler<S> {
    pub fn new(
        config: SchedulerConfig,
        cache_config: CacheConfig,
        client: Arc<RequestClient<S>>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            config,
            client,
            session,
            cache: Cache::new(cache_config),
            alerts: AlertEvaluator::new(),
            aggregator: Aggregator::default(),
            bus: EventBus::default(),
            notifiers: Vec::new(),
            persistence: None,
            symbols: BTreeMap::new(),
            queue: DueQueue::new(),
            in_flight: FuturesUnordered::new(),
            outstanding: HashSet::new(),
            next_track_id: 0,
            next_generation: 0,
            suspended: false,
            visible: true,
            reported_removals: 0,
        }
    }

    /// Publish on an existing bus instead of a private one
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Also deliver alert and state notifications to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Restore from and write back to `persistence`
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Initial holdings; persisted holdings override these per symbol
    pub fn with_holdings(mut self, holdings: HashMap<String, Decimal>) -> Self {
        self.aggregator = Aggregator::new(holdings);
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Start the scheduler task
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.command_buffer.max(1));
        let handle = SchedulerHandle::new(tx, self.bus.clone());
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.restore();

        let period = self.config.sweep_interval();
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(symbols = self.symbols.len(), "Scheduler started");

        loop {
            let deadline = self.queue.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(outcome);
                }

                _ = wait_until(deadline) => {
                    self.fire_due(Instant::now());
                }

                _ = sweep.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!(in_flight = self.in_flight.len(), "Scheduler stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Track { symbol, reply } => {
                let _ = reply.send(self.track(&symbol));
            }
            Command::Untrack { symbol, reply } => {
                let _ = reply.send(self.untrack(&symbol));
            }
            Command::Refresh { symbol, reply } => {
                let _ = reply.send(self.refresh(&symbol));
            }
            Command::Resume { symbol, reply } => {
                let _ = reply.send(self.resume(&symbol));
            }
            Command::SetVisible { visible, reply } => {
                let _ = reply.send(self.set_visible(visible));
            }
            Command::ResumeAll { reply } => {
                self.resume_all();
                let _ = reply.send(());
            }
            Command::AddAlert {
                symbol,
                threshold,
                direction,
                reply,
            } => {
                let _ = reply.send(self.add_alert(&symbol, threshold, direction));
            }
            Command::RemoveAlert { id, reply } => {
                let _ = reply.send(self.remove_alert(id));
            }
            Command::AcknowledgeAlert { id, reply } => {
                let _ = reply.send(self.acknowledge_alert(id));
            }
            Command::Alerts { reply } => {
                let _ = reply.send(self.alerts.alerts().to_vec());
            }
            Command::SetHolding {
                symbol,
                quantity,
                reply,
            } => {
                let _ = reply.send(self.set_holding(&symbol, quantity));
            }
            Command::Totals { reply } => {
                let _ = reply.send(self.aggregator.compute_from_cache(&self.cache));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.symbols.values().map(TrackedSymbol::status).collect());
            }
            Command::MarketStatus { reply } => {
                let _ = reply.send(MarketStatus {
                    session: self.session.current_session(),
                    evaluated_at: Utc::now(),
                });
            }
            Command::CacheStats { reply } => {
                let _ = reply.send(self.cache.stats());
            }
            // handled by the run loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// Load persisted alerts, holdings and symbols
    fn restore(&mut self) {
        let Some(persistence) = self.persistence.clone() else {
            return;
        };

        match persistence.load_alerts() {
            Ok(alerts) => {
                if !alerts.is_empty() {
                    tracing::info!(count = alerts.len(), "Restored alerts");
                    self.alerts = AlertEvaluator::from_alerts(alerts);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to restore alerts"),
        }

        match persistence.load_holdings() {
            Ok(holdings) => {
                for (symbol, quantity) in holdings {
                    self.aggregator.set_holding(&symbol, quantity);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to restore holdings"),
        }

        match persistence.load_symbols() {
            Ok(symbols) => {
                for symbol in symbols {
                    if let Err(e) = self.add_symbol(&symbol) {
                        tracing::warn!(symbol = %symbol, error = %e, "Skipping persisted symbol");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to restore symbols"),
        }

        set_gauge(GaugeMetric::ActiveAlerts, self.alerts.pending_count() as f64);
    }

    fn track(&mut self, symbol: &str) -> Result<SymbolStatus, SchedulerError> {
        let (status, added) = self.add_symbol(symbol)?;
        if added {
            self.persist_symbols();
        }
        Ok(status)
    }

    /// Register a symbol and arm its first tick; `false` when already tracked
    fn add_symbol(&mut self, raw: &str) -> Result<(SymbolStatus, bool), SchedulerError> {
        let symbol =
            normalize_symbol(raw).ok_or_else(|| SchedulerError::InvalidSymbol(raw.to_string()))?;

        if let Some(tracked) = self.symbols.get(&symbol) {
            return Ok((tracked.status(), false));
        }

        self.next_track_id += 1;
        let mut tracked = TrackedSymbol::new(symbol.clone(), self.next_track_id, self.base_interval());
        tracked.last_snapshot = self.cache.get(&CacheKey::quote(symbol.as_str())).cloned();
        let status = tracked.status();
        self.symbols.insert(symbol.clone(), tracked);
        self.schedule(&symbol, Instant::now());

        set_gauge(GaugeMetric::TrackedSymbols, self.symbols.len() as f64);
        tracing::info!(symbol = %symbol, "Tracking symbol");
        self.bus.publish(CoreEvent::SymbolUpdated(status.clone()));
        Ok((status, true))
    }

    fn untrack(&mut self, raw: &str) -> Result<(), SchedulerError> {
        let symbol =
            normalize_symbol(raw).ok_or_else(|| SchedulerError::InvalidSymbol(raw.to_string()))?;
        let removed = self
            .symbols
            .remove(&symbol)
            .ok_or_else(|| SchedulerError::NotTracked(symbol.clone()))?;

        tracing::info!(symbol = %symbol, in_flight = removed.in_flight, "Untracked symbol");

        self.cache.remove(&CacheKey::quote(symbol.as_str()));
        self.persist_symbols();
        set_gauge(GaugeMetric::TrackedSymbols, self.symbols.len() as f64);
        self.bus.publish(CoreEvent::SymbolRemoved { symbol });
        self.publish_totals();
        self.update_cache_metrics();
        Ok(())
    }

    fn refresh(&mut self, raw: &str) -> Result<bool, SchedulerError> {
        let symbol = self.tracked_key(raw)?;
        let paused = self
            .symbols
            .get(&symbol)
            .is_some_and(|t| t.state == SymbolState::Paused);
        if paused {
            return Ok(false);
        }
        Ok(self.start_fetch(&symbol))
    }

    fn resume(&mut self, raw: &str) -> Result<(), SchedulerError> {
        let symbol = self.tracked_key(raw)?;
        let paused = self
            .symbols
            .get(&symbol)
            .is_some_and(|t| t.state == SymbolState::Paused);
        if !paused {
            return Err(SchedulerError::NotPaused(symbol));
        }
        self.resume_symbol(&symbol);
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> bool {
        self.visible = visible;
        if !visible {
            if self.config.pause_when_hidden && !self.suspended {
                tracing::info!("Host hidden, suspending ticks");
                self.suspended = true;
            }
        } else if self.suspended && self.config.resume_on_visible {
            self.lift_suspension();
        }
        self.suspended
    }

    fn resume_all(&mut self) {
        if self.suspended {
            self.lift_suspension();
        }
        let paused: Vec<String> = self
            .symbols
            .values()
            .filter(|t| t.state == SymbolState::Paused)
            .map(|t| t.id.clone())
            .collect();
        for symbol in paused {
            self.resume_symbol(&symbol);
        }
    }

    fn add_alert(
        &mut self,
        raw: &str,
        threshold: Decimal,
        direction: AlertDirection,
    ) -> Result<Alert, SchedulerError> {
        let symbol =
            normalize_symbol(raw).ok_or_else(|| SchedulerError::InvalidSymbol(raw.to_string()))?;
        let created_price = self
            .cache
            .get(&CacheKey::quote(symbol.as_str()))
            .map(|s| s.price);
        let alert = self
            .alerts
            .create(&symbol, threshold, direction, created_price)?;

        tracing::info!(
            symbol = %alert.symbol,
            direction = %alert.direction,
            threshold = %alert.threshold_price,
            "Alert created"
        );
        self.alerts_changed();
        Ok(alert)
    }

    fn remove_alert(&mut self, id: AlertId) -> Result<Alert, SchedulerError> {
        let alert = self.alerts.remove(id)?;
        self.alerts_changed();
        Ok(alert)
    }

    fn acknowledge_alert(&mut self, id: AlertId) -> Result<Alert, SchedulerError> {
        let alert = self.alerts.acknowledge(id)?;
        self.alerts_changed();
        Ok(alert)
    }

    fn set_holding(
        &mut self,
        raw: &str,
        quantity: Option<Decimal>,
    ) -> Result<PortfolioTotals, SchedulerError> {
        let symbol =
            normalize_symbol(raw).ok_or_else(|| SchedulerError::InvalidSymbol(raw.to_string()))?;
        match quantity {
            Some(quantity) => self.aggregator.set_holding(&symbol, quantity),
            None => {
                self.aggregator.remove_holding(&symbol);
            }
        }

        let holdings = self.aggregator.holdings().clone();
        self.persist("holdings", |p| p.save_holdings(&holdings));
        Ok(self.publish_totals())
    }

    /// Run every entry that is due at `now`
    fn fire_due(&mut self, now: Instant) {
        while let Some(entry) = self.queue.pop_due(now) {
            let Some(tracked) = self.symbols.get_mut(&entry.symbol) else {
                continue;
            };
            if tracked.generation != entry.generation {
                continue;
            }

            match entry.kind {
                DueKind::Tick if self.suspended => {
                    tracing::trace!(symbol = %entry.symbol, "Tick held while suspended");
                    tracked.held = true;
                }
                DueKind::Tick => {
                    self.start_fetch(&entry.symbol);
                }
                DueKind::AutoResume => {
                    if tracked.state == SymbolState::Paused {
                        self.resume_symbol(&entry.symbol);
                    }
                }
            }
        }
    }

    /// Issue a fetch unless one is already outstanding
    fn start_fetch(&mut self, symbol: &str) -> bool {
        self.next_generation += 1;
        let generation = self.next_generation;

        let Some(tracked) = self.symbols.get_mut(symbol) else {
            return false;
        };
        if tracked.in_flight {
            tracing::debug!(symbol, "Fetch already in flight");
            return false;
        }
        if self.outstanding.contains(symbol) {
            // started again once the earlier fetch completes
            tracing::debug!(symbol, "Fetch from a previous tracking still outstanding");
            return false;
        }

        // Any armed tick is superseded by this fetch
        tracked.generation = generation;
        tracked.in_flight = true;
        tracked.held = false;
        tracked.state = SymbolState::Loading;
        let status = tracked.status();
        let track_id = tracked.track_id;

        let client = Arc::clone(&self.client);
        let symbol = symbol.to_string();
        self.outstanding.insert(symbol.clone());
        self.in_flight.push(Box::pin(async move {
            let started = Instant::now();
            let result = client.fetch(&symbol).await;
            record_latency(LatencyMetric::Tick, started.elapsed());
            FetchOutcome {
                symbol,
                track_id,
                result,
            }
        }));

        self.bus.publish(CoreEvent::SymbolUpdated(status));
        true
    }

    fn complete(&mut self, outcome: FetchOutcome) {
        self.outstanding.remove(&outcome.symbol);

        let current = self.symbols.get(&outcome.symbol).map(|t| t.track_id);
        if current != Some(outcome.track_id) {
            increment(CounterMetric::DiscardedResult);
            tracing::debug!(symbol = %outcome.symbol, "Discarding result for removed symbol");
            if current.is_some() {
                self.start_deferred(&outcome.symbol);
            }
            return;
        }
        let Some(tracked) = self.symbols.get_mut(&outcome.symbol) else {
            return;
        };
        tracked.in_flight = false;

        match outcome.result {
            Ok(snapshot) => self.on_success(&outcome.symbol, snapshot),
            Err(error) => self.on_failure(&outcome.symbol, error),
        }
    }

    fn on_success(&mut self, symbol: &str, mut snapshot: Snapshot) {
        snapshot.symbol = symbol.to_string();

        let accepted = match self.cache.insert(CacheKey::quote(symbol), snapshot.clone()) {
            Ok(()) => true,
            Err(e @ CacheError::StaleWrite { .. }) => {
                increment(CounterMetric::StaleWrite);
                tracing::debug!(symbol, error = %e, "Stale quote rejected");
                false
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Quote not cached");
                false
            }
        };

        let interval = self.base_interval();
        let Some(tracked) = self.symbols.get_mut(symbol) else {
            return;
        };
        tracked.record_success(interval);
        if accepted {
            tracked.last_snapshot = Some(snapshot.clone());
        }
        let status = tracked.status();

        tracing::debug!(symbol, price = %snapshot.price, accepted, "Quote updated");
        self.schedule(symbol, Instant::now() + interval);
        self.bus.publish(CoreEvent::SymbolUpdated(status));

        if accepted {
            for fired in self.alerts.evaluate(&snapshot) {
                increment(CounterMetric::AlertFired);
                self.notify_alert(&fired);
            }
            self.alerts_changed();
            self.publish_totals();
        }
        self.update_cache_metrics();
    }

    fn on_failure(&mut self, symbol: &str, error: FetchError) {
        let message = error.to_string();
        let Some(tracked) = self.symbols.get_mut(symbol) else {
            return;
        };
        let should_pause = tracked.record_failure(error, &self.config);
        let failures = tracked.consecutive_failures;
        let interval = tracked.interval;
        let error_status = tracked.status();

        tracing::warn!(symbol, failures, error = %message, "Tick failed");
        self.bus.publish(CoreEvent::SymbolUpdated(error_status));
        self.notify_state(symbol, &StateChange::Error { message });

        let now = Instant::now();
        if should_pause {
            let delay = self.config.auto_resume_delay();
            let until = wall_clock_after(delay);
            if let Some(tracked) = self.symbols.get_mut(symbol) {
                tracked.pause(now + delay, until);
            }
            self.schedule_resume(symbol, now + delay);
            increment(CounterMetric::SymbolPaused);
            tracing::warn!(symbol, failures, %until, "Pausing symbol");
            self.notify_state(symbol, &StateChange::Paused { until });
        } else {
            if let Some(tracked) = self.symbols.get_mut(symbol) {
                tracked.state = SymbolState::Idle;
            }
            self.schedule(symbol, now + interval);
        }

        if let Some(tracked) = self.symbols.get(symbol) {
            self.bus.publish(CoreEvent::SymbolUpdated(tracked.status()));
        }
    }

    /// First fetch of a symbol tracked again while its earlier fetch was outstanding
    fn start_deferred(&mut self, symbol: &str) {
        let suspended = self.suspended;
        let Some(tracked) = self.symbols.get_mut(symbol) else {
            return;
        };
        if tracked.in_flight || tracked.state == SymbolState::Paused {
            return;
        }
        if suspended {
            tracked.held = true;
            return;
        }
        self.start_fetch(symbol);
    }

    /// PAUSED to IDLE with an immediate tick
    fn resume_symbol(&mut self, symbol: &str) {
        let interval = self.base_interval();
        let Some(tracked) = self.symbols.get_mut(symbol) else {
            return;
        };
        tracked.resume(interval);
        let status = tracked.status();

        tracing::info!(symbol, "Resuming symbol");
        self.notify_state(symbol, &StateChange::Resumed);
        self.bus.publish(CoreEvent::SymbolUpdated(status));
        self.schedule(symbol, Instant::now());
    }

    /// Re-arm every tick held during suspension
    fn lift_suspension(&mut self) {
        tracing::info!("Resuming suspended ticks");
        self.suspended = false;
        let held: Vec<String> = self
            .symbols
            .values()
            .filter(|t| t.held)
            .map(|t| t.id.clone())
            .collect();
        let now = Instant::now();
        for symbol in held {
            if let Some(tracked) = self.symbols.get_mut(&symbol) {
                tracked.held = false;
            }
            self.schedule(&symbol, now);
        }
    }

    fn sweep(&mut self) {
        let removed = self.cache.sweep();
        if removed > 0 {
            tracing::debug!(removed, "Swept expired quotes");
            self.publish_totals();
        }
        self.update_cache_metrics();
    }

    fn schedule(&mut self, symbol: &str, at: Instant) {
        self.arm(symbol, at, DueKind::Tick);
    }

    fn schedule_resume(&mut self, symbol: &str, at: Instant) {
        self.arm(symbol, at, DueKind::AutoResume);
    }

    fn arm(&mut self, symbol: &str, at: Instant, kind: DueKind) {
        self.next_generation += 1;
        if let Some(tracked) = self.symbols.get_mut(symbol) {
            tracked.generation = self.next_generation;
            self.queue.push(at, symbol, self.next_generation, kind);
        }
    }

    fn base_interval(&self) -> Duration {
        adaptive_interval(self.session.current_session(), &self.config)
    }

    fn tracked_key(&self, raw: &str) -> Result<String, SchedulerError> {
        let symbol =
            normalize_symbol(raw).ok_or_else(|| SchedulerError::InvalidSymbol(raw.to_string()))?;
        if self.symbols.contains_key(&symbol) {
            Ok(symbol)
        } else {
            Err(SchedulerError::NotTracked(symbol))
        }
    }

    fn publish_totals(&self) -> PortfolioTotals {
        let totals = self.aggregator.compute_from_cache(&self.cache);
        set_gauge(
            GaugeMetric::PortfolioValue,
            totals.total_value.to_f64().unwrap_or_default(),
        );
        self.bus.publish(CoreEvent::TotalsUpdated(totals.clone()));
        totals
    }

    fn alerts_changed(&mut self) {
        set_gauge(GaugeMetric::ActiveAlerts, self.alerts.pending_count() as f64);
        if self.alerts.take_dirty() {
            let alerts = self.alerts.alerts().to_vec();
            self.persist("alerts", |p| p.save_alerts(&alerts));
        }
    }

    fn persist_symbols(&self) {
        let symbols: Vec<String> = self.symbols.keys().cloned().collect();
        self.persist("symbols", |p| p.save_symbols(&symbols));
    }

    fn persist(&self, what: &str, save: impl FnOnce(&Persistence) -> Result<(), StoreError>) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = save(persistence) {
                tracing::warn!(what, error = %e, "Failed to persist");
            }
        }
    }

    fn update_cache_metrics(&mut self) {
        let stats = self.cache.stats();
        let removals = stats.evictions + stats.expirations;
        if removals > self.reported_removals {
            increment_by(CounterMetric::CacheEviction, removals - self.reported_removals);
            self.reported_removals = removals;
        }
        set_gauge(GaugeMetric::CacheEntries, stats.entries as f64);
        set_gauge(GaugeMetric::CacheBytes, stats.size_bytes as f64);
    }

    fn notify_alert(&self, event: &AlertFired) {
        self.bus.alert_fired(event);
        for notifier in &self.notifiers {
            notifier.alert_fired(event);
        }
    }

    fn notify_state(&self, symbol: &str, change: &StateChange) {
        self.bus.state_changed(symbol, change);
        for notifier in &self.notifiers {
            notifier.state_changed(symbol, change);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn wall_clock_after(delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
