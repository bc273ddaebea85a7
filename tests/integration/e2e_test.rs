//! End-to-end tests: source → request client → scheduler → cache, alerts, totals

use async_trait::async_trait;
use chrono::Utc;
use quote_sync::alert::AlertDirection;
use quote_sync::config::{
    CacheConfig, RequestConfig, SchedulerConfig, SourceConfig, ValidationConfig,
};
use quote_sync::events::{CoreEvent, StateChange};
use quote_sync::market::{FixedSession, MarketSession};
use quote_sync::quote::{FetchError, HttpQuoteSource, MarketDataSource, Snapshot};
use quote_sync::request::RequestClient;
use quote_sync::scheduler::{Scheduler, SchedulerHandle, SymbolState};
use quote_sync::store::{FileStore, Persistence};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

/// Prices rise by one per call, starting at 100; "FAIL" always errors
#[derive(Default)]
struct RisingSource {
    calls: AtomicU32,
}

#[async_trait]
impl MarketDataSource for RisingSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if symbol == "FAIL" {
            return Err(FetchError::Network("connection reset".into()));
        }
        let price = dec!(100) + Decimal::from(n);
        Ok(Snapshot::new(symbol, price, dec!(100), Utc::now()))
    }
}

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        market_hours_interval_ms: 1_000,
        after_hours_interval_ms: 5_000,
        min_interval_ms: 1_000,
        max_interval_ms: 30_000,
        auto_resume_delay_ms: 60_000,
        ..Default::default()
    }
}

fn request_config() -> RequestConfig {
    RequestConfig {
        retry_attempts: 1,
        max_requests_per_minute: 0,
        ..Default::default()
    }
}

fn start<S: MarketDataSource + 'static>(
    source: S,
    config: SchedulerConfig,
    store: Option<&Path>,
) -> SchedulerHandle {
    let client = Arc::new(RequestClient::new(
        source,
        request_config(),
        ValidationConfig::default(),
    ));
    let mut scheduler = Scheduler::new(
        config,
        CacheConfig::default(),
        client,
        Arc::new(FixedSession(MarketSession::Open)),
    );
    if let Some(path) = store {
        let store = FileStore::open(path).unwrap();
        scheduler = scheduler.with_persistence(Persistence::new(Arc::new(store), "e2e:"));
    }
    scheduler.spawn().0
}

fn drain(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_quotes_flow_into_totals_and_alerts() {
    let handle = start(RisingSource::default(), scheduler_config(), None);
    let mut events = handle.subscribe();

    handle.set_holding("AAPL", Some(dec!(2))).await.unwrap();
    handle
        .add_alert("AAPL", dec!(102), AlertDirection::Above)
        .await
        .unwrap();
    handle.track("AAPL").await.unwrap();

    // ticks at t=0,1,2,3: prices 100..=103
    sleep(Duration::from_millis(3_500)).await;

    let totals = handle.totals().await.unwrap();
    assert_eq!(totals.total_value, dec!(206));
    assert_eq!(totals.total_change, dec!(6));

    let events = drain(&mut events);
    let fired: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::AlertFired(fired) => Some(fired),
            _ => None,
        })
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].price, dec!(102));

    let totals_updates = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::TotalsUpdated(_)))
        .count();
    // one per accepted quote, plus the holding change
    assert_eq!(totals_updates, 5);
}

#[tokio::test(start_paused = true)]
async fn test_failing_symbol_is_isolated() {
    let handle = start(RisingSource::default(), scheduler_config(), None);
    let mut events = handle.subscribe();

    handle.track("AAPL").await.unwrap();
    handle.track("FAIL").await.unwrap();

    // FAIL errors at t=0, 2, 6 and pauses; AAPL keeps polling
    sleep(Duration::from_millis(10_500)).await;

    let statuses = handle.status().await.unwrap();
    let aapl = statuses.iter().find(|s| s.symbol == "AAPL").unwrap();
    let fail = statuses.iter().find(|s| s.symbol == "FAIL").unwrap();
    assert_eq!(aapl.state, SymbolState::Idle);
    assert_eq!(aapl.consecutive_failures, 0);
    assert_eq!(fail.state, SymbolState::Paused);
    assert_eq!(fail.consecutive_failures, 3);

    let totals = handle.totals().await.unwrap();
    assert_eq!(totals.symbol_count, 1);

    let paused = drain(&mut events).into_iter().any(|e| {
        matches!(
            e,
            CoreEvent::StateChanged { ref symbol, change: StateChange::Paused { .. } } if symbol == "FAIL"
        )
    });
    assert!(paused);
}

#[tokio::test(start_paused = true)]
async fn test_state_restored_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let handle = start(RisingSource::default(), scheduler_config(), Some(&path));
    handle.track("msft").await.unwrap();
    handle.set_holding("MSFT", Some(dec!(4))).await.unwrap();
    let alert = assert_ok!(
        handle
            .add_alert("MSFT", dec!(90), AlertDirection::Below)
            .await
    );
    assert_ok!(handle.shutdown().await);
    assert_err!(handle.track("AAPL").await);

    let handle = start(RisingSource::default(), scheduler_config(), Some(&path));
    sleep(Duration::from_millis(10)).await;

    let statuses = handle.status().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].symbol, "MSFT");
    assert_eq!(handle.alerts().await.unwrap()[0].id, alert.id);
    assert_eq!(handle.totals().await.unwrap().total_value, dec!(400));
}

#[tokio::test]
async fn test_http_source_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = format!(
                r#"{{"symbol":"SPY","price":"501.5","previousClose":"500","timestamp":{}}}"#,
                Utc::now().timestamp_millis()
            );
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    let source = HttpQuoteSource::new(SourceConfig {
        base_url,
        ..Default::default()
    })
    .unwrap();
    let handle = start(source, scheduler_config(), None);
    let mut events = handle.subscribe();
    handle.track("SPY").await.unwrap();

    let snapshot = timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CoreEvent::SymbolUpdated(status)) = events.recv().await {
                if let Some(snapshot) = status.last_snapshot {
                    return snapshot;
                }
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(snapshot.price, dec!(501.5));
    assert_eq!(snapshot.change(), dec!(1.5));
    assert_eq!(
        handle.totals().await.unwrap().total_value,
        dec!(501.5)
    );
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_holdings_from_constructor() {
    let client = Arc::new(RequestClient::new(
        RisingSource::default(),
        request_config(),
        ValidationConfig::default(),
    ));
    let (handle, _task) = Scheduler::new(
        scheduler_config(),
        CacheConfig::default(),
        client,
        Arc::new(FixedSession(MarketSession::Closed)),
    )
    .with_holdings(HashMap::from([("aapl".to_string(), dec!(3))]))
    .spawn();

    handle.track("AAPL").await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.totals().await.unwrap().total_value, dec!(300));

    // closed session polls on the after-hours interval
    sleep(Duration::from_millis(4_000)).await;
    assert_eq!(handle.totals().await.unwrap().total_value, dec!(300));
    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(handle.totals().await.unwrap().total_value, dec!(303));
}
