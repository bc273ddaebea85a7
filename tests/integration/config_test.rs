//! Integration tests for configuration loading

use chrono::{TimeZone, Utc};
use quote_sync::config::{Config, DstRule};
use quote_sync::market::{MarketClock, MarketSession};
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;

fn example() -> Config {
    toml::from_str(include_str!("../../config.toml.example")).unwrap()
}

#[test]
fn test_example_config_matches_defaults() {
    let config = example();
    let defaults = Config::default();

    assert_eq!(
        config.scheduler.market_hours_interval_ms,
        defaults.scheduler.market_hours_interval_ms
    );
    assert_eq!(config.scheduler.max_retries, defaults.scheduler.max_retries);
    assert_eq!(config.request.retry_attempts, defaults.request.retry_attempts);
    assert_eq!(config.cache.max_entries, defaults.cache.max_entries);
    assert_eq!(config.validation.min_price, dec!(0.0001));
    assert_eq!(config.market.dst, DstRule::Us);
    assert_eq!(config.market.utc_offset_minutes, -300);
    assert_eq!(config.store.prefix, "quote-sync:");
    assert!(config.store.path.is_none());
    assert_eq!(config.watchlist.symbols, vec!["AAPL", "MSFT", "SPY"]);
    assert_eq!(config.watchlist.holdings["AAPL"], dec!(10));
}

#[test]
fn test_example_calendar_sessions() {
    let clock = MarketClock::new(example().market);

    // Thanksgiving, mid-session
    let thanksgiving = Utc.with_ymd_and_hms(2026, 11, 26, 16, 0, 0).unwrap();
    assert_eq!(clock.session_at(thanksgiving), MarketSession::Holiday);

    // Friday after Thanksgiving, 11:00 EST
    let friday = Utc.with_ymd_and_hms(2026, 11, 27, 16, 0, 0).unwrap();
    assert_eq!(clock.session_at(friday), MarketSession::Open);

    // Saturday
    let saturday = Utc.with_ymd_and_hms(2026, 11, 28, 16, 0, 0).unwrap();
    assert_eq!(clock.session_at(saturday), MarketSession::Weekend);
}

#[test]
fn test_load_partial_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [scheduler]
        max_retries = 7

        [store]
        path = "/tmp/quote-sync-test.json"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.scheduler.max_retries, 7);
    assert_eq!(config.scheduler.min_interval_ms, 5_000);
    assert!(config.store.path.is_some());
}

#[test]
fn test_invalid_file_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[scheduler]\nmax_retries = \"three\"").unwrap();
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_config_serializes_back_to_toml() {
    let config = example();
    let text = toml::to_string_pretty(&config).unwrap();
    let reparsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(reparsed.market.holidays, config.market.holidays);
    assert_eq!(reparsed.watchlist.holdings, config.watchlist.holdings);
}
